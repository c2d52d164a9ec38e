//! Tracing subscriber setup with optional OpenTelemetry export.
//!
//! With an OTLP endpoint configured, spans are exported over gRPC in addition
//! to the stdout fmt layer. Without one, only the fmt layer is installed.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, Result};

const DEFAULT_FILTER: &str = "rag_governance_backend=debug,tower_http=debug,sqlx::query=info";

/// Build the env filter: `RUST_LOG` wins, then the configured log level for
/// this crate, then the built-in default.
fn env_filter(log_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| match log_level {
        Some(level) => format!("rag_governance_backend={level},tower_http={level},sqlx::query=info")
            .into(),
        None => DEFAULT_FILTER.into(),
    })
}

/// Initialize the tracing subscriber.
///
/// Returns a guard that must be held for the lifetime of the process so
/// pending spans are flushed on shutdown. If the OTLP exporter cannot be
/// built, logging falls back to stdout only.
pub fn init_tracing(
    otel_endpoint: Option<&str>,
    service_name: &str,
    log_level: Option<&str>,
) -> Option<OtelGuard> {
    if let Some(endpoint) = otel_endpoint {
        match build_provider(endpoint, service_name) {
            Ok(provider) => {
                use opentelemetry::trace::TracerProvider;

                let tracer = provider.tracer("rag-governance-backend");
                tracing_subscriber::registry()
                    .with(env_filter(log_level))
                    .with(tracing_subscriber::fmt::layer())
                    .with(tracing_opentelemetry::layer().with_tracer(tracer))
                    .init();
                tracing::info!(
                    otel_endpoint = endpoint,
                    service_name,
                    "OpenTelemetry tracing enabled"
                );
                return Some(OtelGuard { provider });
            }
            Err(e) => {
                tracing_subscriber::registry()
                    .with(env_filter(log_level))
                    .with(tracing_subscriber::fmt::layer())
                    .init();
                tracing::warn!(error = %e, "OpenTelemetry export disabled");
                return None;
            }
        }
    }

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(tracing_subscriber::fmt::layer())
        .init();
    None
}

/// Shuts down the tracer provider on drop, flushing pending spans.
pub struct OtelGuard {
    provider: opentelemetry_sdk::trace::SdkTracerProvider,
}

impl Drop for OtelGuard {
    fn drop(&mut self) {
        if let Err(e) = self.provider.shutdown() {
            eprintln!("Failed to shutdown OTel tracer provider: {e:?}");
        }
    }
}

fn build_provider(
    endpoint: &str,
    service_name: &str,
) -> Result<opentelemetry_sdk::trace::SdkTracerProvider> {
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::{SpanExporter, WithExportConfig};
    use opentelemetry_sdk::trace::{BatchSpanProcessor, SdkTracerProvider};
    use opentelemetry_sdk::Resource;

    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to create OTLP span exporter: {e}")))?;

    let resource = Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", service_name.to_owned()),
            KeyValue::new("service.version", env!("CARGO_PKG_VERSION").to_owned()),
        ])
        .build();

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_span_processor(BatchSpanProcessor::builder(exporter).build())
        .build())
}
