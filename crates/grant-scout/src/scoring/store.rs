//! Persistence seam for computed scores and scoring sessions.
//!
//! The service layer only talks to [`ScoreRepository`]; the API binary
//! provides an in-memory implementation and tests provide stubs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::domain::GrantScore;

/// Failures from a score repository.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("score for opportunity '{0}' already stored in this session")]
    Conflict(String),
    #[error("no stored score for opportunity '{0}'")]
    NotFound(String),
    #[error("score store unavailable: {0}")]
    Unavailable(String),
}

/// A score at rest, with the session that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredScore {
    pub session_id: String,
    pub score: GrantScore,
    pub stored_at: DateTime<Utc>,
}

/// Aggregates for one scoring session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub scored: usize,
    pub skipped: usize,
    pub hidden_gems: usize,
    pub cache_hit_rate: f64,
}

/// One batch-scoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringSession {
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub stats: SessionStats,
}

/// Storage backend for scores and sessions.
#[async_trait]
pub trait ScoreRepository: Send + Sync {
    async fn store_score(&self, session_id: &str, score: GrantScore) -> Result<(), StoreError>;

    /// Latest stored score for an opportunity, if any.
    async fn get_score(&self, opportunity_id: &str) -> Result<Option<StoredScore>, StoreError>;

    /// Highest-scoring stored records, best first.
    async fn list_top(&self, limit: usize) -> Result<Vec<StoredScore>, StoreError>;

    async fn create_session(&self, started_at: DateTime<Utc>) -> Result<ScoringSession, StoreError>;

    async fn update_session_results(
        &self,
        session_id: &str,
        stats: SessionStats,
    ) -> Result<(), StoreError>;
}
