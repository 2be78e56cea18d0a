use std::time::Duration;

use serde_json::Map;

use crate::config::CacheConfig;
use crate::scoring::engine::ScoringEngine;
use crate::scoring::service::{ScoreRequest, ScoringService, ServiceError};
use crate::scoring::tests::common::{fixed_now, search_payload, MemoryRepository, StubSource};

fn cache_config() -> CacheConfig {
    CacheConfig {
        ttl: Duration::from_secs(300),
        max_size: 16,
    }
}

fn service(source: StubSource) -> ScoringService<StubSource, MemoryRepository> {
    ScoringService::new(
        source,
        MemoryRepository::default(),
        ScoringEngine::default(),
        &cache_config(),
    )
}

#[tokio::test]
async fn repeated_search_is_served_from_cache() {
    let service = service(StubSource::new(search_payload()));
    let first = service
        .search_opportunities(Map::new())
        .await
        .expect("search succeeds");
    let second = service
        .search_opportunities(Map::new())
        .await
        .expect("cached search succeeds");

    assert_eq!(first, second);
    let stats = service.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn scoring_persists_results_and_session_stats() {
    let service = service(StubSource::new(search_payload()));
    let request = ScoreRequest {
        as_of: Some(fixed_now()),
        ..Default::default()
    };
    let response = service
        .score_opportunities(request)
        .await
        .expect("batch scores");

    assert_eq!(response.result.scores.len(), 2);
    assert_eq!(response.result.skipped.len(), 1);
    assert_eq!(response.result.total_opportunities, 3);
    assert_eq!(response.session.stats.scored, 2);
    assert_eq!(response.session.stats.skipped, 1);
    assert!(response.result.scores[0].total_score >= response.result.scores[1].total_score);

    // The obscure USDA record should surface as a hidden gem.
    assert!(response
        .result
        .hidden_gems
        .iter()
        .any(|gem| gem.opportunity_id == "USDA-25-009"));

    let stored = service
        .explanation("NSF-25-001")
        .await
        .expect("lookup succeeds")
        .expect("score was persisted");
    assert_eq!(stored.session_id, response.session.session_id);
    assert_eq!(stored.score.opportunity_id, "NSF-25-001");
}

#[tokio::test]
async fn pinned_as_of_makes_runs_reproducible() {
    let service = service(StubSource::new(search_payload()));
    let request = || ScoreRequest {
        as_of: Some(fixed_now()),
        ..Default::default()
    };

    let first = service.score_opportunities(request()).await.expect("first run");
    let second = service.score_opportunities(request()).await.expect("second run");

    for (a, b) in first.result.scores.iter().zip(&second.result.scores) {
        assert_eq!(a.opportunity_id, b.opportunity_id);
        assert_eq!(a.total_score, b.total_score);
        assert_eq!(a.recommendation, b.recommendation);
    }
}

#[tokio::test]
async fn explanation_for_unknown_opportunity_is_none() {
    let service = service(StubSource::new(search_payload()));
    let missing = service
        .explanation("NOPE-0")
        .await
        .expect("lookup succeeds");
    assert!(missing.is_none());
}

#[tokio::test]
async fn rate_limit_errors_pass_through_untouched() {
    let service = service(StubSource::rate_limited());
    let err = service
        .search_opportunities(Map::new())
        .await
        .expect_err("upstream is rate limited");

    match err {
        ServiceError::Api(crate::client::ApiError::RateLimited { retry_after, .. }) => {
            assert_eq!(retry_after, 30)
        }
        other => panic!("expected rate limit, got {other:?}"),
    }
}

#[tokio::test]
async fn malformed_envelope_is_a_payload_error() {
    let service = service(StubSource::new(serde_json::json!({"unexpected": true})));
    let err = service
        .score_opportunities(ScoreRequest::default())
        .await
        .expect_err("payload lacks a data array");
    assert!(matches!(err, ServiceError::Payload(_)));
}

#[tokio::test]
async fn scoring_reuses_the_search_cache() {
    let service = service(StubSource::new(search_payload()));
    service
        .search_opportunities(Map::new())
        .await
        .expect("search succeeds");
    let response = service
        .score_opportunities(ScoreRequest {
            as_of: Some(fixed_now()),
            ..Default::default()
        })
        .await
        .expect("scoring succeeds");

    // One prior miss filled the cache; the score path reads it back.
    let stats = service.cache_stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert!((response.result.cache_hit_rate - 0.5).abs() < 1e-12);
}
