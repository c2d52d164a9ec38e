//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Display name reported by the root endpoint
    pub app_name: String,

    /// Audit store backend: "postgres" or "memory"
    pub storage_backend: String,

    /// Database connection URL (required when storage_backend = "postgres")
    pub database_url: Option<String>,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level
    pub log_level: String,

    /// Google Gemini API key
    pub gemini_api_key: String,

    /// Gemini API base URL
    pub gemini_base_url: String,

    /// Gemini model used for answer generation
    pub gemini_model: String,

    /// Gemini model used for query and document embeddings
    pub gemini_embedding_model: String,

    /// Sampling temperature for answer generation
    pub llm_temperature: f32,

    /// Chroma server URL
    pub chroma_url: String,

    /// Chroma collection holding the knowledge base
    pub chroma_collection_name: String,

    /// Number of passages retrieved per prompt
    pub retrieval_top_k: usize,

    /// Seed the built-in sample documents when the collection is empty
    pub seed_sample_documents: bool,

    /// Run the keyword/pattern policy check on prompts and answers
    pub enable_policy_check: bool,

    /// Optional JSON file replacing the built-in policy rules
    pub policy_rules_path: Option<String>,

    /// Comma-separated CORS origins; any origin is allowed when unset
    pub cors_origins: Option<String>,

    /// OTLP collector endpoint (optional)
    pub otel_exporter_otlp_endpoint: Option<String>,

    /// Service name reported to OpenTelemetry
    pub otel_service_name: String,
}

redacted_debug!(Config {
    show app_name,
    show storage_backend,
    redact_option database_url,
    show bind_address,
    show log_level,
    redact gemini_api_key,
    show gemini_base_url,
    show gemini_model,
    show gemini_embedding_model,
    show llm_temperature,
    show chroma_url,
    show chroma_collection_name,
    show retrieval_top_k,
    show seed_sample_documents,
    show enable_policy_check,
    show policy_rules_path,
    show cors_origins,
    show otel_exporter_otlp_endpoint,
    show otel_service_name,
});

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let storage_backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "postgres".into());
        let database_url = env::var("DATABASE_URL").ok();

        match storage_backend.as_str() {
            "postgres" if database_url.is_none() => {
                return Err(AppError::Config("DATABASE_URL not set".into()));
            }
            "postgres" | "memory" => {}
            other => {
                return Err(AppError::Config(format!(
                    "Unknown STORAGE_BACKEND '{}'. Must be one of: postgres, memory",
                    other
                )));
            }
        }

        let retrieval_top_k: usize = env::var("RETRIEVAL_TOP_K")
            .unwrap_or_else(|_| "3".into())
            .parse()
            .unwrap_or(3);
        if retrieval_top_k == 0 {
            return Err(AppError::Config("RETRIEVAL_TOP_K must be at least 1".into()));
        }

        Ok(Self {
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Cloud-Native RAG Platform".into()),
            storage_backend,
            database_url,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8000".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            gemini_api_key: env::var("GOOGLE_GEMINI_API_KEY")
                .map_err(|_| AppError::Config("GOOGLE_GEMINI_API_KEY not set".into()))?,
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com".into()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
            gemini_embedding_model: env::var("GEMINI_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-004".into()),
            llm_temperature: env::var("LLM_TEMPERATURE")
                .unwrap_or_else(|_| "0.7".into())
                .parse()
                .unwrap_or(0.7),
            chroma_url: env::var("CHROMA_URL").unwrap_or_else(|_| "http://localhost:8001".into()),
            chroma_collection_name: env::var("CHROMA_COLLECTION_NAME")
                .unwrap_or_else(|_| "documents".into()),
            retrieval_top_k,
            seed_sample_documents: parse_bool(env::var("SEED_SAMPLE_DOCUMENTS").ok(), true),
            enable_policy_check: parse_bool(env::var("ENABLE_POLICY_CHECK").ok(), true),
            policy_rules_path: env::var("POLICY_RULES_PATH").ok(),
            cors_origins: env::var("CORS_ORIGINS").ok(),
            otel_exporter_otlp_endpoint: env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            otel_service_name: env::var("OTEL_SERVICE_NAME")
                .unwrap_or_else(|_| "rag-governance-backend".into()),
        })
    }
}

fn parse_bool(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"),
        None => default,
    }
}
