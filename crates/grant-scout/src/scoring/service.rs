//! Orchestration layer between the HTTP surface and the core pieces.
//!
//! Owns the response cache, the upstream source, the scoring engine, and the
//! score repository. Handlers stay thin; everything testable happens here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::cache::key::CacheKeyGenerator;
use crate::cache::{CacheStats, TtlCache};
use crate::client::{ApiError, ApiHealth, OpportunitySource};
use crate::config::CacheConfig;
use crate::scoring::domain::{
    BatchScoreResult, Opportunity, ScoringWeights, SkippedRecord, UserProfile,
};
use crate::scoring::engine::{ScoringContext, ScoringEngine, ScoringError};
use crate::scoring::store::{ScoreRepository, ScoringSession, SessionStats, StoreError, StoredScore};

const SEARCH_TOOL: &str = "opportunity_discovery";

/// Failures surfaced by the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error("malformed upstream payload: {0}")]
    Payload(String),
}

/// Body of a scoring request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreRequest {
    /// Upstream search filters; defaults are applied by the client.
    #[serde(default)]
    pub filters: Map<String, Value>,
    pub profile: Option<UserProfile>,
    /// Full weight override; omitted fields are not merged.
    pub weights: Option<ScoringWeights>,
    /// Reference instant for deadline math. Defaults to now; pin it to
    /// reproduce a previous run exactly.
    pub as_of: Option<DateTime<Utc>>,
}

/// Body of a scoring response.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreResponse {
    pub session: ScoringSession,
    #[serde(flatten)]
    pub result: BatchScoreResult,
}

/// Coordinates cached search, scoring, and persistence.
pub struct ScoringService<S, R> {
    source: S,
    repository: R,
    engine: ScoringEngine,
    cache: TtlCache<Value>,
    keys: CacheKeyGenerator,
}

impl<S: OpportunitySource, R: ScoreRepository> ScoringService<S, R> {
    pub fn new(source: S, repository: R, engine: ScoringEngine, cache: &CacheConfig) -> Self {
        Self {
            source,
            repository,
            engine,
            cache: TtlCache::new(cache.ttl, cache.max_size),
            keys: CacheKeyGenerator::with_default_prefixes(),
        }
    }

    /// Search the upstream API, serving repeated filter sets from the cache.
    pub async fn search_opportunities(
        &self,
        filters: Map<String, Value>,
    ) -> Result<Value, ServiceError> {
        let key = self.keys.hash(SEARCH_TOOL, &filters);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let response = self.source.search_opportunities(filters).await?;
        self.cache.set(key, response.clone());
        Ok(response)
    }

    /// Search and score in one pass, persisting every score under a fresh
    /// session. Unscorable and unparsable records are skipped, never fatal.
    pub async fn score_opportunities(
        &self,
        request: ScoreRequest,
    ) -> Result<ScoreResponse, ServiceError> {
        let as_of = request.as_of.unwrap_or_else(Utc::now);
        let response = self.search_opportunities(request.filters).await?;
        let (opportunities, mut parse_skips) = extract_opportunities(&response)?;

        let mut context = ScoringContext::new(as_of);
        context.profile = request.profile;
        context.weight_overrides = request.weights;

        let session = self.repository.create_session(as_of).await?;
        let mut result = self.engine.score_batch(&opportunities, &context);
        result.total_opportunities += parse_skips.len();
        result.skipped.append(&mut parse_skips);
        result.skipped.sort_by_key(|record| record.index);

        for score in &result.scores {
            self.repository
                .store_score(&session.session_id, score.clone())
                .await?;
        }

        result.cache_hit_rate = self.cache.stats().hit_rate;
        let stats = SessionStats {
            scored: result.scores.len(),
            skipped: result.skipped.len(),
            hidden_gems: result.hidden_gems.len(),
            cache_hit_rate: result.cache_hit_rate,
        };
        self.repository
            .update_session_results(&session.session_id, stats)
            .await?;

        info!(
            session_id = %session.session_id,
            scored = stats.scored,
            skipped = stats.skipped,
            hidden_gems = stats.hidden_gems,
            "scoring session complete"
        );

        Ok(ScoreResponse {
            session: ScoringSession { stats, ..session },
            result,
        })
    }

    /// Full stored breakdown for a previously scored opportunity.
    pub async fn explanation(
        &self,
        opportunity_id: &str,
    ) -> Result<Option<StoredScore>, ServiceError> {
        Ok(self.repository.get_score(opportunity_id).await?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Probe the upstream API.
    pub async fn source_health(&self) -> Result<ApiHealth, ServiceError> {
        Ok(self.source.health().await?)
    }
}

/// Pull the record array out of the upstream search envelope, tolerating
/// individually malformed records.
fn extract_opportunities(
    response: &Value,
) -> Result<(Vec<Opportunity>, Vec<SkippedRecord>), ServiceError> {
    let records = response
        .get("data")
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::Payload("missing 'data' array".to_string()))?;

    let mut opportunities = Vec::with_capacity(records.len());
    let mut skipped = Vec::new();
    for (index, record) in records.iter().enumerate() {
        match serde_json::from_value::<Opportunity>(record.clone()) {
            Ok(opportunity) => opportunities.push(opportunity),
            Err(err) => {
                warn!(index, error = %err, "dropping unparsable record");
                skipped.push(SkippedRecord {
                    index,
                    reason: format!("unparsable record: {err}"),
                });
            }
        }
    }
    Ok((opportunities, skipped))
}
