//! Tracing subscriber setup for the sequencer processes.
//!
//! | Variable | Effect |
//! |---|---|
//! | `RUST_LOG` | Log filter; falls back to [`TelemetryConfig::default_filter`]. |
//! | `CRS_LOG_FORMAT=json` | Newline-delimited JSON instead of compact text. |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | Enables OTLP/HTTP span export to that collector. |
//!
//! ```rust,no_run
//! use crs_runtime::telemetry::{init_tracing, TelemetryConfig};
//!
//! let _guard = init_tracing(&TelemetryConfig::from_env("crs"));
//! ```

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{Resource, trace::SdkTracerProvider};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

/// How logs and spans leave the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub json: bool,
    pub otlp_endpoint: Option<String>,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            json: false,
            otlp_endpoint: None,
            default_filter: "info".to_string(),
        }
    }

    /// Read `CRS_LOG_FORMAT` and `OTEL_EXPORTER_OTLP_ENDPOINT`.
    pub fn from_env(service_name: impl Into<String>) -> Self {
        let mut cfg = Self::new(service_name);
        cfg.json = std::env::var("CRS_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
        cfg.otlp_endpoint = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT")
            .ok()
            .filter(|v| !v.trim().is_empty());
        cfg
    }
}

/// Install the global subscriber.
///
/// Hold the returned guard until exit; dropping it flushes and shuts down
/// the span exporter.  A second call in the same process leaves the first
/// subscriber in place.
pub fn init_tracing(config: &TelemetryConfig) -> TracerProviderGuard {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let provider = config
        .otlp_endpoint
        .as_deref()
        .and_then(|endpoint| build_provider(&config.service_name, endpoint));

    let otel_layer = provider.as_ref().map(|p| {
        tracing_opentelemetry::layer().with_tracer(p.tracer(config.service_name.clone()))
    });
    let fmt_layer = if config.json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().compact().boxed()
    };

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(otel_layer)
        .with(fmt_layer)
        .try_init();
    if let Err(e) = installed {
        eprintln!("[crs] tracing subscriber already installed: {e}");
    }

    TracerProviderGuard(provider)
}

/// Shuts the [`SdkTracerProvider`] down on drop.
pub struct TracerProviderGuard(Option<SdkTracerProvider>);

impl TracerProviderGuard {
    /// True when spans are being exported over OTLP.
    pub fn is_exporting(&self) -> bool {
        self.0.is_some()
    }
}

impl Drop for TracerProviderGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.0.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("[crs] OpenTelemetry provider shutdown error: {e}");
            }
        }
    }
}

fn build_provider(service_name: &str, endpoint: &str) -> Option<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| eprintln!("[crs] OTLP exporter init failed: {e}"))
        .ok()?;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    // Simple exporter: the CLI builds its Tokio runtime after this runs.
    Some(
        SdkTracerProvider::builder()
            .with_resource(resource)
            .with_simple_exporter(exporter)
            .build(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_config_logs_text_at_info() {
        let cfg = TelemetryConfig::new("crs-test");
        assert_eq!(cfg.service_name, "crs-test");
        assert!(!cfg.json);
        assert!(cfg.otlp_endpoint.is_none());
        assert_eq!(cfg.default_filter, "info");
    }

    #[test]
    fn guard_without_provider_is_not_exporting() {
        let guard = TracerProviderGuard(None);
        assert!(!guard.is_exporting());
        drop(guard);
    }

    #[test]
    fn init_twice_does_not_panic() {
        let cfg = TelemetryConfig::new("crs-test");
        let first = init_tracing(&cfg);
        let second = init_tracing(&cfg);
        assert!(!first.is_exporting());
        assert!(!second.is_exporting());
    }
}
