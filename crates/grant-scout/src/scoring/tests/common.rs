//! Shared stubs and fixtures for scoring tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::client::{ApiError, ApiHealth, OpportunitySource};
use crate::scoring::domain::GrantScore;
use crate::scoring::store::{
    ScoreRepository, ScoringSession, SessionStats, StoreError, StoredScore,
};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap()
}

/// Canned search payload: two scorable records and one without an id.
pub fn search_payload() -> Value {
    json!({
        "data": [
            {
                "opportunity_id": "NSF-25-001",
                "opportunity_title": "Computing Research",
                "opportunity_status": "posted",
                "agency_code": "NSF",
                "summary": {
                    "award_ceiling": 100000.0,
                    "expected_number_of_awards": 1,
                    "close_date": "2025-06-15"
                }
            },
            {
                "opportunity_id": "USDA-25-009",
                "opportunity_title": "Various Other Activities",
                "opportunity_status": "posted",
                "agency_code": "USDA",
                "category": "Other",
                "summary": {
                    "award_ceiling": 40000.0,
                    "expected_number_of_awards": 1,
                    "estimated_total_program_funding": 400000.0
                }
            },
            {
                "opportunity_id": "",
                "opportunity_title": "Broken Record",
                "opportunity_status": "posted"
            }
        ],
        "pagination_info": { "total_records": 3 }
    })
}

/// Upstream stub that replays a fixed payload.
pub struct StubSource {
    payload: Value,
    fail_with_rate_limit: bool,
}

impl StubSource {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            fail_with_rate_limit: false,
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            payload: Value::Null,
            fail_with_rate_limit: true,
        }
    }
}

#[async_trait]
impl OpportunitySource for StubSource {
    async fn search_opportunities(&self, _filters: Map<String, Value>) -> Result<Value, ApiError> {
        if self.fail_with_rate_limit {
            return Err(ApiError::RateLimited {
                retry_after: 30,
                message: "slow down".to_string(),
            });
        }
        Ok(self.payload.clone())
    }

    async fn search_agencies(&self, _filters: Map<String, Value>) -> Result<Value, ApiError> {
        Ok(json!({ "data": [] }))
    }

    async fn get_opportunity(&self, opportunity_id: &str) -> Result<Value, ApiError> {
        Ok(json!({ "data": { "opportunity_id": opportunity_id } }))
    }

    async fn health(&self) -> Result<ApiHealth, ApiError> {
        Ok(ApiHealth {
            status: "healthy".to_string(),
            response_time_ms: 1,
            rate_limit_remaining: Some(100),
        })
    }
}

#[derive(Default)]
struct MemoryState {
    scores: HashMap<String, StoredScore>,
    sessions: HashMap<String, ScoringSession>,
    next_session: usize,
}

/// In-memory repository mirroring the API binary's implementation.
#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

#[async_trait]
impl ScoreRepository for MemoryRepository {
    async fn store_score(&self, session_id: &str, score: GrantScore) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        state.scores.insert(
            score.opportunity_id.clone(),
            StoredScore {
                session_id: session_id.to_string(),
                score,
                stored_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get_score(&self, opportunity_id: &str) -> Result<Option<StoredScore>, StoreError> {
        let state = self.state.lock().expect("state mutex poisoned");
        Ok(state.scores.get(opportunity_id).cloned())
    }

    async fn list_top(&self, limit: usize) -> Result<Vec<StoredScore>, StoreError> {
        let state = self.state.lock().expect("state mutex poisoned");
        let mut all: Vec<StoredScore> = state.scores.values().cloned().collect();
        all.sort_by(|a, b| b.score.total_score.total_cmp(&a.score.total_score));
        all.truncate(limit);
        Ok(all)
    }

    async fn create_session(
        &self,
        started_at: DateTime<Utc>,
    ) -> Result<ScoringSession, StoreError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        state.next_session += 1;
        let session = ScoringSession {
            session_id: format!("session-{}", state.next_session),
            started_at,
            stats: SessionStats::default(),
        };
        state
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn update_session_results(
        &self,
        session_id: &str,
        stats: SessionStats,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("state mutex poisoned");
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        session.stats = stats;
        Ok(())
    }
}
