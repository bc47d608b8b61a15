use opentelemetry::{
    global,
    metrics::{Counter, Histogram, MeterProvider, UpDownCounter},
    KeyValue,
};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::Registry;
use std::collections::HashSet;

pub struct Metrics {
    frames_received: Counter<u64>,
    frames_rejected: Counter<u64>,
    batches: Counter<u64>,
    prediction_duration: Histogram<u64>,
    active_sessions: UpDownCounter<i64>,
    _provider: SdkMeterProvider,
    pub registry: Registry,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();
        let exporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()?;

        let provider = SdkMeterProvider::builder().with_reader(exporter).build();

        let meter = provider.meter("bee_stream");
        global::set_meter_provider(provider.clone());

        let frames_received = meter
            .u64_counter("frames_received_total")
            .with_description("Total number of frames received over websocket sessions")
            .build();

        let frames_rejected = meter
            .u64_counter("frames_rejected_total")
            .with_description("Frames skipped because they could not be decoded or preprocessed")
            .build();

        let batches = meter
            .u64_counter("batches_total")
            .with_description("Batches submitted to the classifier, by outcome")
            .build();

        let boundaries = generate_boundaries((5, 25, 45, 505, 2005));

        let prediction_duration = meter
            .u64_histogram("prediction_duration_ms")
            .with_boundaries(boundaries)
            .with_description("Duration of batch predictions in milliseconds")
            .build();

        let active_sessions = meter
            .i64_up_down_counter("active_sessions")
            .with_description("Number of open streaming sessions")
            .build();

        Ok(Metrics {
            frames_received,
            frames_rejected,
            batches,
            prediction_duration,
            active_sessions,
            _provider: provider,
            registry,
        })
    }

    pub fn record_frame(&self) {
        self.frames_received.add(1, &[]);
    }

    pub fn record_rejected_frame(&self, reason: &'static str) {
        let attributes = vec![KeyValue::new("reason", reason)];
        self.frames_rejected.add(1, &attributes);
    }

    pub fn record_batch(&self, outcome: &'static str) {
        let attributes = vec![KeyValue::new("outcome", outcome)];
        self.batches.add(1, &attributes);
    }

    pub fn record_prediction_duration(&self, duration_ms: u64) {
        self.prediction_duration.record(duration_ms, &[]);
    }

    pub fn session_opened(&self) {
        self.active_sessions.add(1, &[]);
    }

    pub fn session_closed(&self) {
        self.active_sessions.add(-1, &[]);
    }
}

fn generate_boundaries(parts: (i32, i32, i32, i32, i32)) -> Vec<f64> {
    let first_step: usize = 10;
    let middle_step: usize = 5;
    let end_step: usize = 20;
    let tail_step: usize = 500;
    let first_part = (parts.0..=parts.1).step_by(first_step);
    let middle_part = (parts.1..=parts.2).step_by(middle_step);
    let end_part = (parts.2..=parts.3).step_by(end_step);
    let tail_part = (parts.3..=parts.4).step_by(tail_step);

    let mut seen = HashSet::new();
    first_part
        .chain(middle_part)
        .chain(end_part)
        .chain(tail_part)
        .filter(|&x| seen.insert(x))
        .map(|x| x as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_boundaries() {
        let parts = (5, 25, 45, 85, 1085);
        let get = generate_boundaries(parts);
        let expected = vec![
            5.0, 15.0, 25.0, 30.0, 35.0, 40.0, 45.0, 65.0, 85.0, 585.0, 1085.0,
        ];

        assert_eq!(get, expected);
    }

    #[test]
    fn test_metrics_are_exported() {
        let metrics = Metrics::new().unwrap();
        metrics.record_frame();
        metrics.record_rejected_frame("decode");
        metrics.record_batch("predicted");
        metrics.record_prediction_duration(12);
        metrics.session_opened();

        let names: Vec<String> = metrics
            .registry
            .gather()
            .iter()
            .map(|family| family.get_name().to_string())
            .collect();

        assert!(names.iter().any(|name| name.starts_with("frames_received")));
        assert!(names.iter().any(|name| name.starts_with("prediction_duration_ms")));
    }
}
