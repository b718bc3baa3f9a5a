//! OpenTelemetry integration for coedit.
//!
//! Provides the OTel tracing layer, W3C Trace Context injection for outbound
//! HTTP requests, and a sampler with differentiated rates by span category.
//!
//! # Activation
//!
//! The OTel pieces only exist with the `telemetry` feature. Export then
//! activates when standard OTel environment variables are set:
//!
//! ```bash
//! OTEL_EXPORTER_OTLP_ENDPOINT=http://localhost:4317 coedit notes/today
//! ```
//!
//! Set `OTEL_SDK_DISABLED=true` to explicitly disable even when the endpoint is set.

#[cfg(feature = "telemetry")]
mod otel;

#[cfg(feature = "telemetry")]
pub use otel::{OtelGuard, otel_layer};

/// Check whether OTel export should be enabled.
///
/// Returns `true` when standard OTel env vars indicate export is desired:
/// - `OTEL_SDK_DISABLED` is NOT set to `"true"`
/// - AND at least one of:
///   - `OTEL_EXPORTER_OTLP_ENDPOINT` is set
///   - `OTEL_TRACES_EXPORTER` is set (and not `"none"`)
///
/// Always `false` when built without the `telemetry` feature.
pub fn otel_enabled() -> bool {
    if !cfg!(feature = "telemetry") {
        return false;
    }

    if std::env::var("OTEL_SDK_DISABLED")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
    {
        return false;
    }

    if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        return true;
    }

    if let Ok(exporter) = std::env::var("OTEL_TRACES_EXPORTER") {
        return !exporter.eq_ignore_ascii_case("none");
    }

    false
}

/// Inject W3C Trace Context from the current tracing span.
///
/// Returns `(traceparent, tracestate)`; both are empty when there is no
/// active OTel context (or the feature is off).
pub fn inject_trace_context() -> (String, String) {
    #[cfg(feature = "telemetry")]
    {
        otel::inject_trace_context_impl()
    }
    #[cfg(not(feature = "telemetry"))]
    {
        (String::new(), String::new())
    }
}

/// Sampling rate for a span, keyed on its name prefix.
///
/// | Prefix       | Rate |
/// |--------------|------|
/// | `conflict.*` | 100% |
/// | `save.*`     | 100% |
/// | `fetch.*`    | 10%  |
/// | `push.*`     | 1%   |
/// | other        | 10%  |
pub fn sample_rate(span_name: &str) -> f64 {
    if span_name.starts_with("conflict") || span_name.starts_with("save") {
        1.0
    } else if span_name.starts_with("push") {
        0.01
    } else {
        0.1
    }
}
