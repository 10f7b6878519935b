//! Analysis orchestration.
//!
//! - [`orchestrator`]: one request end to end (LLM call, parse, reconcile)
//! - [`batch`]: many requests with bounded concurrency and optional persistence

pub mod batch;
pub mod orchestrator;

pub use batch::{BatchAnalyzer, BatchItem, CancellationFlag};
pub use orchestrator::{AnalysisOrchestrator, AnalysisRequest, AnalysisState, FAILURE_RATIONALE_PREFIX};
