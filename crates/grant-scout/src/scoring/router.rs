//! HTTP surface over [`ScoringService`].
//!
//! Handlers only extract, delegate, and serialize. Error payloads are always
//! `{"error": "..."}` with a status drawn from the error taxonomy.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::client::{ApiError, OpportunitySource};
use crate::scoring::service::{ScoreRequest, ScoringService, ServiceError};
use crate::scoring::store::ScoreRepository;

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Api(ApiError::RateLimited { .. }) => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::Api(_) | ServiceError::Payload(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Scoring(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchRequest {
    #[serde(default)]
    filters: Map<String, Value>,
}

/// All scoring routes, mounted under `/api/v1`.
pub fn scoring_router<S, R>(service: Arc<ScoringService<S, R>>) -> Router
where
    S: OpportunitySource + 'static,
    R: ScoreRepository + 'static,
{
    Router::new()
        .route("/api/v1/opportunities/search", post(search::<S, R>))
        .route("/api/v1/opportunities/score", post(score::<S, R>))
        .route(
            "/api/v1/opportunities/:opportunity_id/explanation",
            get(explanation::<S, R>),
        )
        .route("/api/v1/cache/stats", get(cache_stats::<S, R>))
        .route("/api/v1/upstream/health", get(upstream_health::<S, R>))
        .with_state(service)
}

async fn search<S: OpportunitySource, R: ScoreRepository>(
    State(service): State<Arc<ScoringService<S, R>>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<Value>, ServiceError> {
    let response = service.search_opportunities(request.filters).await?;
    Ok(Json(response))
}

async fn score<S: OpportunitySource, R: ScoreRepository>(
    State(service): State<Arc<ScoringService<S, R>>>,
    Json(request): Json<ScoreRequest>,
) -> Result<Response, ServiceError> {
    let response = service.score_opportunities(request).await?;
    Ok(Json(response).into_response())
}

async fn explanation<S: OpportunitySource, R: ScoreRepository>(
    State(service): State<Arc<ScoringService<S, R>>>,
    Path(opportunity_id): Path<String>,
) -> Result<Response, ServiceError> {
    match service.explanation(&opportunity_id).await? {
        Some(stored) => Ok(Json(stored).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": format!("no stored score for opportunity '{opportunity_id}'")
            })),
        )
            .into_response()),
    }
}

async fn cache_stats<S: OpportunitySource, R: ScoreRepository>(
    State(service): State<Arc<ScoringService<S, R>>>,
) -> Response {
    Json(service.cache_stats()).into_response()
}

async fn upstream_health<S: OpportunitySource, R: ScoreRepository>(
    State(service): State<Arc<ScoringService<S, R>>>,
) -> Result<Response, ServiceError> {
    let health = service.source_health().await?;
    Ok(Json(health).into_response())
}
