use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, HeaderValue, Method};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use axon_api::config::ServerConfig;
use axon_api::{router, state::AppState};
use axon_db::store::{PgJobStore, PgReportStore};
use axon_inference::{HttpFrameStore, HttpInference};
use axon_orchestrator::{Orchestrator, OrchestratorConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "axon_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = axon_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    axon_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    axon_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Orchestrator ---
    let http_client = reqwest_client();
    let inference = Arc::new(HttpInference::with_client(
        http_client.clone(),
        config.inference(),
    ));
    let frames = Arc::new(HttpFrameStore::with_client(
        http_client,
        config.frame_store_url.clone(),
    ));
    let orchestrator = Orchestrator::new(
        Arc::new(PgJobStore::new(pool.clone())),
        Arc::new(PgReportStore::new(pool.clone())),
        inference,
        frames,
        OrchestratorConfig {
            batch_mode: config.batch_mode,
        },
    );
    tracing::info!(batch_mode = ?config.batch_mode, "Orchestrator initialized");

    // --- App state ---
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
    };

    let cors = build_cors_layer(&config);
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        .merge(router::health_routes())
        .nest("/api/v1", router::api_routes())
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Cancel running batch jobs; each finalizes itself as cancelled with
    // its partial results.
    orchestrator.shutdown();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    while orchestrator.active_job_count().await > 0 {
        if tokio::time::Instant::now() >= deadline {
            tracing::warn!("Batch jobs still finalizing at shutdown deadline");
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    tracing::info!("Graceful shutdown complete");
}

fn reqwest_client() -> reqwest::Client {
    reqwest::Client::new()
}

fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
}

/// Wait for a termination signal to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
