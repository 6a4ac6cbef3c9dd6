//! Logging and optional `OpenTelemetry` export.
//!
//! Log lines always go to stderr, since stdout carries the stdio protocol.
//! With the `telemetry` feature, OTLP trace and metric exporters are added
//! when `OTEL_EXPORTER_OTLP_*` variables are present.

use std::time::Duration;

use axum::http::{Request, Response};
#[cfg(feature = "telemetry")]
use opentelemetry::trace::{Status, TracerProvider};
#[cfg(feature = "telemetry")]
use opentelemetry::{KeyValue, Value, global};
#[cfg(feature = "telemetry")]
use opentelemetry_sdk::{
    Resource,
    metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider},
    trace::{RandomIdGenerator, Sampler, SdkTracerProvider},
};
#[cfg(feature = "telemetry")]
use opentelemetry_semantic_conventions::{
    SCHEMA_URL,
    attribute::{DEPLOYMENT_ENVIRONMENT_NAME, SERVICE_VERSION},
};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::Span;
#[cfg(feature = "telemetry")]
use tracing_opentelemetry::{MetricsLayer, OpenTelemetryLayer, OpenTelemetrySpanExt};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Resolve an env var with a programmatic fallback.
#[cfg(feature = "telemetry")]
fn resolve_env(env_key: &str, fallback: Option<&Value>) -> Option<Value> {
    std::env::var(env_key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(Value::from)
        .or_else(|| fallback.cloned())
}

/// Detects OTLP protocol from environment. Returns `None` if OTEL is not configured.
#[cfg(feature = "telemetry")]
fn detect_protocol() -> Option<OtlpProtocol> {
    let is_enabled = ["ENDPOINT", "HEADERS", "PROTOCOL"]
        .iter()
        .any(|suffix| std::env::var(format!("OTEL_EXPORTER_OTLP_{suffix}")).is_ok());
    is_enabled.then(|| match std::env::var("OTEL_EXPORTER_OTLP_PROTOCOL").as_deref() {
        Ok("grpc") => OtlpProtocol::Grpc,
        _ => OtlpProtocol::Http,
    })
}

#[cfg(feature = "telemetry")]
#[derive(Debug, Clone, Copy)]
enum OtlpProtocol {
    Http,
    Grpc,
}

/// Service identity reported to OTLP collectors.
///
/// Identity values can be overridden via `OTEL_SERVICE_NAME`,
/// `OTEL_SERVICE_VERSION` and `OTEL_SERVICE_DEPLOYMENT`.
#[derive(Debug, Default)]
#[cfg_attr(not(feature = "telemetry"), allow(dead_code))]
pub struct Telemetry {
    name: Option<String>,
    version: Option<String>,
}

impl Telemetry {
    /// Creates a new, empty [`Telemetry`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the service version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    #[cfg(feature = "telemetry")]
    fn resource(&self) -> Resource {
        let name = resolve_env("OTEL_SERVICE_NAME", self.name.clone().map(Value::from).as_ref());
        let version = resolve_env(
            "OTEL_SERVICE_VERSION",
            self.version.clone().map(Value::from).as_ref(),
        );
        let deployment = resolve_env("OTEL_SERVICE_DEPLOYMENT", None);

        let mut builder = Resource::builder();
        if let Some(name) = name {
            builder = builder.with_service_name(name);
        }
        let mut attributes = Vec::<KeyValue>::with_capacity(2);
        if let Some(version) = version {
            attributes.push(KeyValue::new(SERVICE_VERSION, version));
        }
        if let Some(deployment) = deployment {
            attributes.push(KeyValue::new(DEPLOYMENT_ENVIRONMENT_NAME, deployment));
        }
        if !attributes.is_empty() {
            builder = builder.with_schema_url(attributes, SCHEMA_URL);
        }
        builder.build()
    }

    #[cfg(feature = "telemetry")]
    fn init_tracer(&self, protocol: OtlpProtocol) -> Option<SdkTracerProvider> {
        let exporter = match protocol {
            OtlpProtocol::Http => opentelemetry_otlp::SpanExporter::builder()
                .with_http()
                .build(),
            OtlpProtocol::Grpc => opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .build(),
        };
        let exporter = exporter.ok()?;

        Some(
            SdkTracerProvider::builder()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    1.0,
                ))))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(self.resource())
                .with_batch_exporter(exporter)
                .build(),
        )
    }

    #[cfg(feature = "telemetry")]
    fn init_meter(&self, protocol: OtlpProtocol) -> Option<SdkMeterProvider> {
        let exporter = match protocol {
            OtlpProtocol::Http => opentelemetry_otlp::MetricExporter::builder()
                .with_http()
                .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
                .build(),
            OtlpProtocol::Grpc => opentelemetry_otlp::MetricExporter::builder()
                .with_tonic()
                .with_temporality(opentelemetry_sdk::metrics::Temporality::default())
                .build(),
        };
        let exporter = exporter.ok()?;

        let reader = PeriodicReader::builder(exporter)
            .with_interval(Duration::from_secs(30))
            .build();
        let provider = MeterProviderBuilder::default()
            .with_resource(self.resource())
            .with_reader(reader)
            .build();
        global::set_meter_provider(provider.clone());
        Some(provider)
    }

    /// Installs the global subscriber.
    ///
    /// Returns a [`TelemetryGuard`] that flushes exporters on drop.
    pub fn register(self) -> TelemetryGuard {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

        #[cfg(feature = "telemetry")]
        {
            let protocol = detect_protocol();
            let (tracer_provider, meter_provider) = protocol.map_or_else(
                || (None, None),
                |p| (self.init_tracer(p), self.init_meter(p)),
            );
            let otel_layer = tracer_provider
                .as_ref()
                .map(|tp| OpenTelemetryLayer::new(tp.tracer("sonic-mcp")));
            let metrics_layer = meter_provider
                .as_ref()
                .map(|mp| MetricsLayer::new(mp.clone()));

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .with(metrics_layer)
                .with(otel_layer)
                .init();

            if protocol.is_some() {
                tracing::info!("OpenTelemetry exporters registered");
            } else {
                tracing::debug!("OpenTelemetry is not configured, logging to stderr only");
            }

            TelemetryGuard {
                tracer_provider,
                meter_provider,
            }
        }

        #[cfg(not(feature = "telemetry"))]
        {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
            TelemetryGuard {}
        }
    }
}

/// Owns the tracer and meter providers; performs graceful shutdown on drop.
#[derive(Debug)]
pub struct TelemetryGuard {
    #[cfg(feature = "telemetry")]
    tracer_provider: Option<SdkTracerProvider>,
    #[cfg(feature = "telemetry")]
    meter_provider: Option<SdkMeterProvider>,
}

#[cfg(feature = "telemetry")]
impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(ref tp) = self.tracer_provider
            && let Err(err) = tp.shutdown()
        {
            tracing::error!(?err, "tracer provider shutdown error");
        }
        if let Some(ref mp) = self.meter_provider
            && let Err(err) = mp.shutdown()
        {
            tracing::error!(?err, "meter provider shutdown error");
        }
    }
}

/// Trace layer type applied to the HTTP transport.
pub type HttpTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, HttpMakeSpan, DefaultOnRequest, HttpOnResponse>;

impl TelemetryGuard {
    /// Creates an HTTP tracing layer for the axum transport.
    #[must_use]
    #[allow(clippy::unused_self)]
    pub fn http_tracing(&self) -> HttpTraceLayer {
        TraceLayer::new_for_http()
            .make_span_with(HttpMakeSpan)
            .on_response(HttpOnResponse)
    }
}

/// Custom span maker for HTTP requests.
#[derive(Clone, Copy, Debug)]
pub struct HttpMakeSpan;

impl<A> MakeSpan<A> for HttpMakeSpan {
    fn make_span(&mut self, request: &Request<A>) -> Span {
        tracing::info_span!(
            "http_request",
            otel.kind = "server",
            otel.name = %format!("{} {}", request.method(), request.uri()),
            method = %request.method(),
            uri = %request.uri(),
            version = ?request.version(),
            status = tracing::field::Empty,
        )
    }
}

/// Custom response handler for HTTP tracing.
#[derive(Clone, Copy, Debug)]
pub struct HttpOnResponse;

impl<A> OnResponse<A> for HttpOnResponse {
    fn on_response(self, response: &Response<A>, latency: Duration, span: &Span) {
        span.record("status", tracing::field::display(response.status().as_u16()));

        #[cfg(feature = "telemetry")]
        {
            if response.status().is_success() {
                span.set_status(Status::Ok);
            } else {
                span.set_status(Status::error(
                    response
                        .status()
                        .canonical_reason()
                        .unwrap_or("unknown")
                        .to_string(),
                ));
            }
        }

        tracing::info!(
            "status={} elapsed={}ms",
            response.status().as_u16(),
            latency.as_millis()
        );
    }
}
