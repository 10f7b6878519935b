//! Zero Scoring Library
//!
//! Turns free-form LLM analysis output into a bounded `{score, rationale}`
//! pair that downstream strategies can rank and persist.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        zero-scoring                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────────┐   ┌──────────────────┐  │
//! │  │  LLM Client  │──▶│  Response Parser │──▶│  Result Store    │  │
//! │  │  (retry)     │   │  (stage cascade) │   │  (SQLite)        │  │
//! │  └──────────────┘   └──────────────────┘   └──────────────────┘  │
//! │          ▲                    │                                  │
//! │          └──── Analysis Orchestrator / Batch Analyzer ───────────│
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Stage cascade
//! - **Strict / fenced JSON**: the happy path
//! - **Repaired JSON**: bad escapes, raw newlines, unescaped quotes fixed in one pass
//! - **Embedded JSON**: an object surrounded by prose
//! - **Nested unwrap**: the real payload JSON-encoded inside the rationale field
//! - **Regex fallback**: "评分是85", "score: 0.7", "85分" in plain text
//!
//! ## Zero sentinel
//! - A score of `0.0` means "no usable signal", never a neutral midpoint
//! - A structured `0` is treated as a placeholder when the text states a score

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analysis;
pub mod llm;
pub mod parser;
pub mod store;

pub use analysis::{AnalysisOrchestrator, AnalysisRequest, BatchAnalyzer, BatchItem, CancellationFlag};
pub use llm::{HttpLlmClient, LlmClient, LlmError, Prompt, ProviderFamily};
pub use parser::{AnalysisResult, ConsistencyValidator, ParseFailure, ResponseParser, StageTag};
pub use store::{ResultStore, SqliteResultStore, StrategyRecord};
