//! Bounded-concurrency analysis of many subjects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use super::orchestrator::{AnalysisOrchestrator, AnalysisRequest};
use crate::parser::AnalysisResult;
use crate::store::{ResultStore, StrategyRecord};

/// Cooperative cancellation shared between a batch and its controller.
///
/// Cancelling stops new requests from being issued; in-flight requests run
/// to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome for one request of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchItem {
    pub subject: String,
    pub strategy: String,
    /// `None` when the request was skipped after cancellation
    pub result: Option<AnalysisResult>,
}

/// Runs requests through an [`AnalysisOrchestrator`] with bounded concurrency.
pub struct BatchAnalyzer {
    orchestrator: Arc<AnalysisOrchestrator>,
    concurrency: usize,
    store: Option<Arc<dyn ResultStore>>,
    cancel: CancellationFlag,
}

impl BatchAnalyzer {
    pub fn new(orchestrator: Arc<AnalysisOrchestrator>, concurrency: usize) -> Self {
        Self {
            orchestrator,
            concurrency: concurrency.max(1),
            store: None,
            cancel: CancellationFlag::new(),
        }
    }

    /// Persist every completed result to `store`.
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> CancellationFlag {
        self.cancel.clone()
    }

    /// Analyse all requests. Output order matches input order.
    pub async fn run(&self, requests: Vec<AnalysisRequest>) -> Vec<BatchItem> {
        let total = requests.len();

        let mut indexed: Vec<(usize, BatchItem)> = stream::iter(requests.into_iter().enumerate())
            .map(|(index, request)| async move { (index, self.run_one(request).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let items: Vec<BatchItem> = indexed.into_iter().map(|(_, item)| item).collect();

        let completed = items.iter().filter(|item| item.result.is_some()).count();
        info!(total, completed, skipped = total - completed, "Batch analysis finished");

        items
    }

    async fn run_one(&self, request: AnalysisRequest) -> BatchItem {
        if self.cancel.is_cancelled() {
            return BatchItem {
                subject: request.subject,
                strategy: request.strategy,
                result: None,
            };
        }

        let result = self.orchestrator.analyze(&request).await;

        if let Some(store) = &self.store {
            let record = StrategyRecord::from_result(&request.subject, &request.strategy, &result);
            if let Err(e) = store.save(&record).await {
                warn!(
                    subject = %request.subject,
                    strategy = %request.strategy,
                    error = %e,
                    "Failed to persist analysis result"
                );
            }
        }

        BatchItem {
            subject: request.subject,
            strategy: request.strategy,
            result: Some(result),
        }
    }
}
