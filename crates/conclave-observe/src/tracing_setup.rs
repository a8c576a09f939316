//! Global subscriber for the `conclave` binary.
//!
//! Log lines always go to stderr through a `fmt` layer. With `enable_otel`
//! the same spans are also handed to an OpenTelemetry tracer that prints
//! them with the stdout exporter.
//!
//! ```no_run
//! conclave_observe::tracing_setup::init_tracing(true, "info").unwrap();
//! // ... run the command ...
//! conclave_observe::tracing_setup::shutdown_tracing();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Name reported by every exported span.
const TRACER_NAME: &str = "conclave";

static PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("a global subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] TryInitError),
}

fn otel_provider() -> SdkTracerProvider {
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build();
    let _ = PROVIDER.set(provider.clone());
    opentelemetry::global::set_tracer_provider(provider.clone());
    provider
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter` when it parses.
pub fn init_tracing(enable_otel: bool, default_filter: &str) -> Result<(), TracingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE);

    let otel = enable_otel.then(|| {
        let tracer = otel_provider().tracer(TRACER_NAME);
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr)
        .with(otel)
        .try_init()?;
    Ok(())
}

/// Flush buffered spans. Does nothing when OpenTelemetry was never enabled.
pub fn shutdown_tracing() {
    let Some(provider) = PROVIDER.get() else {
        return;
    };
    if let Err(error) = provider.shutdown() {
        eprintln!("warning: span exporter did not shut down cleanly: {error}");
    }
}
