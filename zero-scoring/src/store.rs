//! Persistence of strategy results.
//!
//! One row per `(subject, strategy)`; re-analysing a subject overwrites the
//! previous result.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::parser::{round_score, AnalysisResult, StageTag};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS strategy_results (
    subject      TEXT NOT NULL,
    strategy     TEXT NOT NULL,
    score        REAL NOT NULL,
    rationale    TEXT NOT NULL,
    stage        TEXT NOT NULL,
    analyzed_at  TEXT NOT NULL,
    PRIMARY KEY (subject, strategy)
);
";

/// Persisted result of one strategy run for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    /// Subject identifier (e.g., stock code)
    pub subject: String,
    /// Strategy name
    pub strategy: String,
    /// Score rounded to two decimals
    pub score: f64,
    /// Reconciled, unwrapped rationale
    pub rationale: String,
    /// Stage the score came from
    pub stage: StageTag,
    pub analyzed_at: DateTime<Utc>,
}

impl StrategyRecord {
    pub fn from_result(
        subject: impl Into<String>,
        strategy: impl Into<String>,
        result: &AnalysisResult,
    ) -> Self {
        Self {
            subject: subject.into(),
            strategy: strategy.into(),
            score: round_score(result.score),
            rationale: result.rationale.clone(),
            stage: result.confidence_stage,
            analyzed_at: Utc::now(),
        }
    }
}

/// Storage backend for strategy results.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert or replace the record for its `(subject, strategy)`.
    async fn save(&self, record: &StrategyRecord) -> Result<()>;

    /// Load the record for `(subject, strategy)`, if present.
    async fn load(&self, subject: &str, strategy: &str) -> Result<Option<StrategyRecord>>;
}

/// SQLite-backed [`ResultStore`].
pub struct SqliteResultStore {
    conn: Mutex<Connection>,
}

impl SqliteResultStore {
    /// Open (or create) the database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database {}", db_path.display()))?;
        Self::with_connection(conn)
    }

    /// In-memory database, for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to initialize scoring database schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl ResultStore for SqliteResultStore {
    async fn save(&self, record: &StrategyRecord) -> Result<()> {
        let conn = self.conn.lock().await;

        conn.execute(
            r"
            INSERT INTO strategy_results (subject, strategy, score, rationale, stage, analyzed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (subject, strategy) DO UPDATE SET
                score = excluded.score,
                rationale = excluded.rationale,
                stage = excluded.stage,
                analyzed_at = excluded.analyzed_at
            ",
            params![
                record.subject,
                record.strategy,
                record.score,
                record.rationale,
                record.stage.to_string(),
                record.analyzed_at.to_rfc3339(),
            ],
        )
        .with_context(|| {
            format!(
                "Failed to save result for '{}' / '{}'",
                record.subject, record.strategy
            )
        })?;

        Ok(())
    }

    async fn load(&self, subject: &str, strategy: &str) -> Result<Option<StrategyRecord>> {
        let conn = self.conn.lock().await;

        let row = conn
            .query_row(
                r"
                SELECT score, rationale, stage, analyzed_at
                FROM strategy_results WHERE subject = ?1 AND strategy = ?2
                ",
                params![subject, strategy],
                |row| {
                    Ok((
                        row.get::<_, f64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .with_context(|| format!("Failed to load result for '{}' / '{}'", subject, strategy))?;

        let Some((score, rationale, stage, analyzed_at)) = row else {
            return Ok(None);
        };

        Ok(Some(StrategyRecord {
            subject: subject.to_string(),
            strategy: strategy.to_string(),
            score,
            rationale,
            stage: parse_stage(&stage)?,
            analyzed_at: DateTime::parse_from_rfc3339(&analyzed_at)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid timestamp '{}'", analyzed_at))?,
        }))
    }
}

fn parse_stage(s: &str) -> Result<StageTag> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .with_context(|| format!("Unknown stage '{}'", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn result(score: f64, rationale: &str, stage: StageTag) -> AnalysisResult {
        AnalysisResult {
            score,
            rationale: rationale.to_string(),
            confidence_stage: stage,
        }
    }

    #[test]
    fn test_record_rounds_score() {
        let record = StrategyRecord::from_result(
            "600519",
            "llm_fundamental",
            &result(0.6549, "稳健", StageTag::StrictJson),
        );
        assert_eq!(record.score, 0.65);
        assert_eq!(record.stage, StageTag::StrictJson);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = SqliteResultStore::open_in_memory().unwrap();
        let record = StrategyRecord::from_result(
            "600519",
            "llm_fundamental",
            &result(0.75, "Good fundamentals.", StageTag::NestedUnwrap),
        );

        store.save(&record).await.unwrap();
        let loaded = store.load("600519", "llm_fundamental").await.unwrap().unwrap();

        assert_eq!(loaded.score, 0.75);
        assert_eq!(loaded.rationale, "Good fundamentals.");
        assert_eq!(loaded.stage, StageTag::NestedUnwrap);
        assert_eq!(loaded.analyzed_at.timestamp(), record.analyzed_at.timestamp());
    }

    #[tokio::test]
    async fn test_upsert_overwrites() {
        let store = SqliteResultStore::open_in_memory().unwrap();
        let first = StrategyRecord::from_result("000001", "public_opinion", &result(0.4, "a", StageTag::StrictJson));
        let second = StrategyRecord::from_result("000001", "public_opinion", &result(0.8, "b", StageTag::RegexFallback));

        store.save(&first).await.unwrap();
        store.save(&second).await.unwrap();

        let loaded = store.load("000001", "public_opinion").await.unwrap().unwrap();
        assert_eq!(loaded.score, 0.8);
        assert_eq!(loaded.rationale, "b");
        assert_eq!(loaded.stage, StageTag::RegexFallback);
    }

    #[tokio::test]
    async fn test_strategies_are_separate() {
        let store = SqliteResultStore::open_in_memory().unwrap();
        store
            .save(&StrategyRecord::from_result("000001", "a", &result(0.1, "x", StageTag::StrictJson)))
            .await
            .unwrap();

        assert!(store.load("000001", "b").await.unwrap().is_none());
        assert!(store.load("000002", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_creates_parent_dir() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("scoring.db");
        let store = SqliteResultStore::open(&db_path).unwrap();

        store
            .save(&StrategyRecord::from_result("1", "s", &AnalysisResult::sentinel("LLM分析失败: timeout")))
            .await
            .unwrap();
        assert!(db_path.exists());
    }
}
