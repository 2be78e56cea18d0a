use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use grant_scout::scoring::store::{
    ScoreRepository, ScoringSession, SessionStats, StoreError, StoredScore,
};
use grant_scout::scoring::GrantScore;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct ScoreStoreState {
    scores: HashMap<String, StoredScore>,
    sessions: HashMap<String, ScoringSession>,
    next_session: u64,
}

/// Process-local score store. Scores are keyed by opportunity id; repeat
/// scoring overwrites with the latest result.
#[derive(Default, Clone)]
pub(crate) struct InMemoryScoreRepository {
    state: Arc<Mutex<ScoreStoreState>>,
}

#[async_trait]
impl ScoreRepository for InMemoryScoreRepository {
    async fn store_score(&self, session_id: &str, score: GrantScore) -> Result<(), StoreError> {
        let mut guard = self.state.lock().expect("repository mutex poisoned");
        guard.scores.insert(
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
        let guard = self.state.lock().expect("repository mutex poisoned");
        Ok(guard.scores.get(opportunity_id).cloned())
    }

    async fn list_top(&self, limit: usize) -> Result<Vec<StoredScore>, StoreError> {
        let guard = self.state.lock().expect("repository mutex poisoned");
        let mut all: Vec<StoredScore> = guard.scores.values().cloned().collect();
        all.sort_by(|a, b| b.score.total_score.total_cmp(&a.score.total_score));
        all.truncate(limit);
        Ok(all)
    }

    async fn create_session(
        &self,
        started_at: DateTime<Utc>,
    ) -> Result<ScoringSession, StoreError> {
        let mut guard = self.state.lock().expect("repository mutex poisoned");
        guard.next_session += 1;
        let session = ScoringSession {
            session_id: format!("session-{}", guard.next_session),
            started_at,
            stats: SessionStats::default(),
        };
        guard
            .sessions
            .insert(session.session_id.clone(), session.clone());
        Ok(session)
    }

    async fn update_session_results(
        &self,
        session_id: &str,
        stats: SessionStats,
    ) -> Result<(), StoreError> {
        let mut guard = self.state.lock().expect("repository mutex poisoned");
        let session = guard
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::NotFound(session_id.to_string()))?;
        session.stats = stats;
        Ok(())
    }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use grant_scout::scoring::{Opportunity, ScoringContext, ScoringEngine};

    fn sample_score() -> GrantScore {
        let engine = ScoringEngine::default();
        let record = Opportunity {
            opportunity_id: "OPP-1".to_string(),
            opportunity_title: "Test".to_string(),
            ..Default::default()
        };
        engine
            .score_one(&record, &ScoringContext::new(Utc::now()))
            .expect("record scores")
    }

    #[tokio::test]
    async fn store_and_fetch_roundtrip() {
        let repo = InMemoryScoreRepository::default();
        let session = repo.create_session(Utc::now()).await.expect("session");
        repo.store_score(&session.session_id, sample_score())
            .await
            .expect("stores");

        let fetched = repo.get_score("OPP-1").await.expect("fetch works");
        assert_eq!(fetched.expect("present").session_id, session.session_id);
        assert!(repo.get_score("OPP-2").await.expect("fetch works").is_none());
    }

    #[tokio::test]
    async fn updating_an_unknown_session_fails() {
        let repo = InMemoryScoreRepository::default();
        let err = repo
            .update_session_results("session-99", SessionStats::default())
            .await
            .expect_err("unknown session");
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn parse_date_accepts_iso_only() {
        assert!(parse_date("2025-06-15").is_ok());
        assert!(parse_date("06/15/2025").is_err());
    }
}
