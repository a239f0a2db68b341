//! Prometheus counters for validation outcomes

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};
use qspec_validate::ValidationError;

pub struct Metrics {
    registry: Registry,
    validations: IntCounterVec,
    rejections: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let validations = IntCounterVec::new(
            Opts::new("qspec_validations_total", "Query specs validated, by result"),
            &["result"],
        )?;
        let rejections = IntCounterVec::new(
            Opts::new("qspec_rejections_total", "Rejected query specs, by error kind"),
            &["kind"],
        )?;

        registry.register(Box::new(validations.clone()))?;
        registry.register(Box::new(rejections.clone()))?;

        Ok(Self {
            registry,
            validations,
            rejections,
        })
    }

    pub fn observe(&self, outcome: &Result<(), ValidationError>) {
        match outcome {
            Ok(()) => self.validations.with_label_values(&["accepted"]).inc(),
            Err(err) => {
                self.validations.with_label_values(&["rejected"]).inc();
                self.rejections.with_label_values(&[err.kind().as_str()]).inc();
            }
        }
    }

    /// Prometheus text exposition format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
