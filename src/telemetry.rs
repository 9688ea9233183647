//! Telemetry bootstrap for the exemplars store binary.
//!
//! Installs the JSON `tracing` subscriber and the global OpenTelemetry tracer
//! and meter providers. Settings come from the standard `OTEL_*` variables
//! plus `EXEMPLARS_TELEMETRY_ENABLED` and `EXEMPLARS_TELEMETRY_RUN_ID`.

use crate::{Error, Result};

use opentelemetry::global;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{self, Sampler, TracerProvider};
use opentelemetry_sdk::Resource;
use std::collections::BTreeMap;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

pub const ENV_TELEMETRY_ENABLED: &str = "EXEMPLARS_TELEMETRY_ENABLED";
pub const ENV_TELEMETRY_RUN_ID: &str = "EXEMPLARS_TELEMETRY_RUN_ID";

const ATTR_SERVICE_NAME: &str = "service.name";
const ATTR_SERVICE_NAMESPACE: &str = "service.namespace";
const ATTR_RUN_ID: &str = "exemplars.run_id";
const SERVICE_NAMESPACE: &str = "exemplars";
const OTEL_PROTOCOL_GRPC: &str = "grpc";
const OTEL_PROTOCOL_HTTP_PROTOBUF: &str = "http/protobuf";

/// Runtime mode for telemetry exporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelemetryMode {
    Disabled,
    Otlp,
}

impl TelemetryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TelemetryMode::Disabled => "disabled",
            TelemetryMode::Otlp => "otlp",
        }
    }
}

/// Parsed telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub mode: TelemetryMode,
    pub service_name: String,
    pub otlp_endpoint: Option<String>,
    pub otlp_protocol: String,
    pub traces_sampler: String,
    pub run_id: Option<String>,
    pub resource_attributes: Vec<KeyValue>,
    sampler: Sampler,
}

impl TelemetryConfig {
    pub fn from_env(default_service_name: &str) -> Result<Self> {
        Self::from_lookup(default_service_name, |name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(default_service_name: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| {
            lookup(name)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let service_name = lookup("OTEL_SERVICE_NAME")
            .unwrap_or_else(|| default_service_name.to_string())
            .trim()
            .to_string();
        if service_name.is_empty() {
            return Err(Error::Config("OTEL_SERVICE_NAME cannot be empty".to_string()));
        }

        let endpoint = non_empty("OTEL_EXPORTER_OTLP_ENDPOINT");
        let protocol = parse_otlp_protocol(
            &lookup("OTEL_EXPORTER_OTLP_PROTOCOL").unwrap_or_else(|| OTEL_PROTOCOL_GRPC.to_string()),
        )?;

        let enabled = match lookup(ENV_TELEMETRY_ENABLED) {
            Some(raw) => Some(parse_bool(ENV_TELEMETRY_ENABLED, &raw)?),
            None => None,
        };
        let mode = match (enabled, endpoint.is_some()) {
            (Some(false), _) => TelemetryMode::Disabled,
            (Some(true), true) | (None, true) => TelemetryMode::Otlp,
            (Some(true), false) => {
                return Err(Error::Config(format!(
                    "{}=true requires OTEL_EXPORTER_OTLP_ENDPOINT",
                    ENV_TELEMETRY_ENABLED
                )));
            }
            (None, false) => TelemetryMode::Disabled,
        };

        let run_id = non_empty(ENV_TELEMETRY_RUN_ID);

        let sampler_name = lookup("OTEL_TRACES_SAMPLER")
            .unwrap_or_else(|| "parentbased_always_on".to_string());
        let sampler_arg = lookup("OTEL_TRACES_SAMPLER_ARG");
        let sampler = parse_sampler(&sampler_name, sampler_arg.as_deref())?;

        let mut attributes: BTreeMap<String, String> = BTreeMap::new();
        if let Some(raw) = lookup("OTEL_RESOURCE_ATTRIBUTES") {
            attributes.extend(parse_resource_attributes(&raw)?);
        }
        attributes.insert(ATTR_SERVICE_NAME.to_string(), service_name.clone());
        attributes
            .entry(ATTR_SERVICE_NAMESPACE.to_string())
            .or_insert_with(|| SERVICE_NAMESPACE.to_string());
        if let Some(run_id) = &run_id {
            attributes.insert(ATTR_RUN_ID.to_string(), run_id.clone());
        }

        Ok(Self {
            mode,
            service_name,
            otlp_endpoint: endpoint,
            otlp_protocol: protocol.to_string(),
            traces_sampler: sampler_name,
            run_id,
            resource_attributes: attributes
                .into_iter()
                .map(|(k, v)| KeyValue::new(k, v))
                .collect(),
            sampler,
        })
    }
}

/// Handle that keeps telemetry SDK providers alive for process lifetime.
pub struct Telemetry {
    config: TelemetryConfig,
    tracer_provider: TracerProvider,
    meter_provider: SdkMeterProvider,
}

impl Telemetry {
    /// Initialize tracing and the OTel SDK providers.
    pub fn init(default_service_name: &str, log_level: &str) -> Result<Self> {
        let config = TelemetryConfig::from_env(default_service_name)?;
        let level = parse_log_level(log_level)?;

        FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .with_thread_ids(true)
            .json()
            .try_init()
            .map_err(|e| Error::Config(format!("failed to initialize telemetry subscriber: {e}")))?;

        let resource =
            Resource::default().merge(&Resource::new(config.resource_attributes.clone()));

        let tracer_provider = TracerProvider::builder()
            .with_config(
                trace::Config::default()
                    .with_sampler(config.sampler.clone())
                    .with_resource(resource.clone()),
            )
            .build();
        let _ = global::set_tracer_provider(tracer_provider.clone());

        let meter_provider = SdkMeterProvider::builder().with_resource(resource).build();
        global::set_meter_provider(meter_provider.clone());
        global::set_text_map_propagator(TraceContextPropagator::new());

        info!(
            service_name = %config.service_name,
            telemetry_mode = config.mode.as_str(),
            otlp_endpoint = %config.otlp_endpoint.as_deref().unwrap_or("none"),
            otlp_protocol = %config.otlp_protocol,
            traces_sampler = %config.traces_sampler,
            run_id = %config.run_id.as_deref().unwrap_or("none"),
            "Telemetry initialized"
        );

        Ok(Self {
            config,
            tracer_provider,
            meter_provider,
        })
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn run_id(&self) -> Option<&str> {
        self.config.run_id.as_deref()
    }

    pub fn mode(&self) -> &TelemetryMode {
        &self.config.mode
    }
}

impl Drop for Telemetry {
    fn drop(&mut self) {
        let _ = self.meter_provider.shutdown();
        let _ = self.tracer_provider.shutdown();
    }
}

fn parse_otlp_protocol(raw: &str) -> Result<&'static str> {
    match raw.trim().to_ascii_lowercase().as_str() {
        OTEL_PROTOCOL_GRPC => Ok(OTEL_PROTOCOL_GRPC),
        OTEL_PROTOCOL_HTTP_PROTOBUF | "http/proto" | "http" => Ok(OTEL_PROTOCOL_HTTP_PROTOBUF),
        other => Err(Error::Config(format!(
            "OTEL_EXPORTER_OTLP_PROTOCOL must be one of [grpc, http/protobuf], got '{other}'"
        ))),
    }
}

pub fn parse_log_level(raw: &str) -> Result<Level> {
    raw.trim().parse::<Level>().map_err(|_| {
        Error::Config(format!(
            "invalid log level '{raw}', expected one of [trace, debug, info, warn, error]"
        ))
    })
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{name} must be a boolean (true/false/1/0), got '{raw}'"
        ))),
    }
}

fn parse_sampler(name: &str, arg: Option<&str>) -> Result<Sampler> {
    match name.trim().to_ascii_lowercase().as_str() {
        "always_on" => Ok(Sampler::AlwaysOn),
        "always_off" => Ok(Sampler::AlwaysOff),
        "traceidratio" => Ok(Sampler::TraceIdRatioBased(parse_ratio(arg)?)),
        "parentbased_always_on" => Ok(Sampler::ParentBased(Box::new(Sampler::AlwaysOn))),
        "parentbased_always_off" => Ok(Sampler::ParentBased(Box::new(Sampler::AlwaysOff))),
        "parentbased_traceidratio" => Ok(Sampler::ParentBased(Box::new(
            Sampler::TraceIdRatioBased(parse_ratio(arg)?),
        ))),
        other => Err(Error::Config(format!(
            "OTEL_TRACES_SAMPLER '{other}' is not supported"
        ))),
    }
}

fn parse_ratio(arg: Option<&str>) -> Result<f64> {
    let raw = arg.ok_or_else(|| {
        Error::Config("OTEL_TRACES_SAMPLER_ARG is required for ratio samplers".to_string())
    })?;
    let value = raw.trim().parse::<f64>().map_err(|e| {
        Error::Config(format!("OTEL_TRACES_SAMPLER_ARG must be a float in [0,1]: {e}"))
    })?;
    if !(0.0..=1.0).contains(&value) {
        return Err(Error::Config(format!(
            "OTEL_TRACES_SAMPLER_ARG must be in [0,1], got {value}"
        )));
    }
    Ok(value)
}

fn parse_resource_attributes(raw: &str) -> Result<Vec<(String, String)>> {
    let mut attrs = Vec::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::Config(format!(
                "OTEL_RESOURCE_ATTRIBUTES entry '{pair}' is invalid, expected key=value"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(Error::Config(
                "OTEL_RESOURCE_ATTRIBUTES contains an empty attribute key".to_string(),
            ));
        }
        attrs.push((key.to_string(), value.trim().to_string()));
    }
    Ok(attrs)
}
