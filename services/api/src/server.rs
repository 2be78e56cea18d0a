use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryScoreRepository};
use crate::routes::with_scoring_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use grant_scout::client::GrantsApiClient;
use grant_scout::config::AppConfig;
use grant_scout::error::AppError;
use grant_scout::scoring::{IndustryTables, ScoringEngine, ScoringService};
use grant_scout::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let client = GrantsApiClient::new(&config.grants_api)?;
    let repository = InMemoryScoreRepository::default();
    let engine = ScoringEngine::new(IndustryTables::default());
    let service = Arc::new(ScoringService::new(
        client,
        repository,
        engine,
        &config.cache,
    ));

    let app = with_scoring_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "grant scout api ready");

    axum::serve(listener, app).await?;
    Ok(())
}
