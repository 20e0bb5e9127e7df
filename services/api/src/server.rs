use crate::cli::ServeArgs;
use crate::infra::{seed_directory, AppState, InMemoryLeadNotifier, InMemoryLeadRepository};
use crate::routes::with_lead_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

use leadflow::config::AppConfig;
use leadflow::error::AppError;
use leadflow::leads::{AssignmentConfig, LeadPipelineService, ScoringConfig};
use leadflow::telemetry;

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

    let repository = Arc::new(InMemoryLeadRepository::default());
    repository.seed_representatives(seed_directory());
    let notifier = Arc::new(InMemoryLeadNotifier::default());
    let pipeline = Arc::new(LeadPipelineService::new(
        repository,
        notifier,
        ScoringConfig::default(),
        AssignmentConfig {
            assignable_role: config.pipeline.assignable_role.clone(),
        },
    ));

    let app = with_lead_routes(pipeline)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "lead pipeline service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
