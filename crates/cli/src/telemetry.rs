//! OpenTelemetry export, compiled in with the `telemetry` feature

use anyhow::Result;
use tracing_subscriber::{registry::Registry, Layer};

pub type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Tracing layer exporting spans over OTLP, if configured
///
/// # Environment Variables
///
/// - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (e.g., http://localhost:4317)
/// - `OTEL_SERVICE_NAME`: Service name (default: nimbus)
pub fn layer() -> Result<Option<BoxedLayer>> {
    let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") else {
        return Ok(None);
    };

    #[cfg(feature = "telemetry")]
    {
        otlp_layer(&endpoint).map(Some)
    }

    #[cfg(not(feature = "telemetry"))]
    {
        eprintln!(
            "OTEL_EXPORTER_OTLP_ENDPOINT={} ignored: rebuild with --features telemetry",
            endpoint
        );
        Ok(None)
    }
}

#[cfg(feature = "telemetry")]
fn otlp_layer(endpoint: &str) -> Result<BoxedLayer> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry::KeyValue;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::{runtime, trace::TracerProvider, Resource};

    let service_name = std::env::var("OTEL_SERVICE_NAME").unwrap_or_else(|_| "nimbus".to_string());

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.clone(),
        )]))
        .build();

    let tracer = provider.tracer(service_name);
    opentelemetry::global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer).boxed())
}

/// Flush pending spans before exit
pub fn shutdown() {
    #[cfg(feature = "telemetry")]
    opentelemetry::global::shutdown_tracer_provider();
}
