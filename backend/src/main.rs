//! RAG Governance - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use rag_governance_backend::{
    api::{self, AppState},
    config::Config,
    db,
    error::{AppError, Result},
    services::{
        chroma_client::ChromaRetriever,
        gemini_client::{GeminiClient, GeminiConfig},
        metrics_service,
        policy_service::PolicyEngine,
        rag_service::RagService,
    },
    storage::{memory::MemoryAuditStore, postgres::PostgresAuditStore, AuditStore},
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    let _otel_guard = telemetry::init_tracing(
        config.otel_exporter_otlp_endpoint.as_deref(),
        &config.otel_service_name,
        Some(&config.log_level),
    );
    tracing::info!(config = ?config, "Starting {}", config.app_name);

    let store = init_audit_store(&config).await?;

    let gemini = Arc::new(GeminiClient::new(GeminiConfig::from_config(&config))?);
    let retriever = ChromaRetriever::connect(
        &config.chroma_url,
        &config.chroma_collection_name,
        gemini.clone(),
    )
    .await?;
    tracing::info!(
        collection = %config.chroma_collection_name,
        "Connected to vector store"
    );

    if config.seed_sample_documents {
        let seeded = retriever.seed_sample_documents().await?;
        if seeded > 0 {
            tracing::info!(documents = seeded, "Seeded sample documents");
        }
    }

    let policy = PolicyEngine::from_config(
        config.enable_policy_check,
        config.policy_rules_path.as_deref(),
    )?;
    tracing::info!(
        enabled = policy.is_enabled(),
        rules = policy.rule_count(),
        "Policy engine ready"
    );

    let rag = RagService::new(Arc::new(retriever), gemini, config.retrieval_top_k);

    let mut app_state = AppState::new(config.clone(), store, Arc::new(rag), Arc::new(policy));
    match metrics_service::init_metrics() {
        Ok(handle) => app_state.set_metrics_handle(handle),
        Err(e) => tracing::warn!(error = %e, "Prometheus recorder not installed"),
    }
    let state = Arc::new(app_state);

    let app = api::routes::create_router(state)
        .layer(cors_layer(config.cors_origins.as_deref())?)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn init_audit_store(config: &Config) -> Result<Arc<dyn AuditStore>> {
    match config.storage_backend.as_str() {
        "postgres" => {
            let database_url = config
                .database_url
                .as_deref()
                .ok_or_else(|| AppError::Config("DATABASE_URL not set".into()))?;
            let pool = db::create_pool(database_url).await?;
            tracing::info!("Connected to database");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Ok(Arc::new(PostgresAuditStore::new(pool)))
        }
        _ => {
            tracing::warn!("Using in-memory audit store; records are lost on restart");
            Ok(Arc::new(MemoryAuditStore::new()))
        }
    }
}

fn cors_layer(origins: Option<&str>) -> Result<CorsLayer> {
    let Some(origins) = origins else {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    };

    let origins = origins
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<HeaderValue>()
                .map_err(|_| AppError::Config(format!("Invalid CORS origin: {}", s)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
