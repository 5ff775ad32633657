// Prometheus metrics definitions for submissions and playback.

use lazy_static::lazy_static;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ── Gauges ───────────────────────────────────────────────────────

    /// Playbacks currently in PLAYING.
    pub static ref ACTIVE_PLAYBACKS: IntGauge =
        IntGauge::new("robomaze_active_playbacks", "Playbacks currently running").unwrap();

    // ── Counters ─────────────────────────────────────────────────────

    /// Total submissions sent to the run service, by kind (practice, tournament).
    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("robomaze_submissions_total", "Total submissions sent"),
        &["kind"],
    )
    .unwrap();

    /// Submission outcomes, by result (won, halted, run_failure, transport_failure, timeout, invalid_response).
    pub static ref SUBMISSION_OUTCOMES_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("robomaze_submission_outcomes_total", "Submission outcomes"),
        &["result"],
    )
    .unwrap();

    /// Telemetry frames delivered to the view.
    pub static ref FRAMES_DELIVERED_TOTAL: IntCounter = IntCounter::new(
        "robomaze_frames_delivered_total",
        "Telemetry frames delivered to the view",
    )
    .unwrap();

    /// Playbacks cancelled while PLAYING.
    pub static ref PLAYBACKS_CANCELLED_TOTAL: IntCounter = IntCounter::new(
        "robomaze_playbacks_cancelled_total",
        "Playbacks cancelled before the last frame",
    )
    .unwrap();

    /// Playbacks that reached FINISHED.
    pub static ref PLAYBACKS_FINISHED_TOTAL: IntCounter = IntCounter::new(
        "robomaze_playbacks_finished_total",
        "Playbacks that delivered every frame",
    )
    .unwrap();

    /// Manual commands applied, by command.
    pub static ref MANUAL_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("robomaze_manual_commands_total", "Manual commands applied"),
        &["command"],
    )
    .unwrap();

    // ── Histograms ───────────────────────────────────────────────────

    /// Run-service round trip in seconds.
    pub static ref SUBMISSION_DURATION_SECONDS: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "robomaze_submission_duration_seconds",
            "Run service round trip in seconds",
        )
        .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0, 30.0]),
    )
    .unwrap();
}

/// Register all metrics with the custom registry. Call once at startup.
pub fn register_metrics() {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(ACTIVE_PLAYBACKS.clone()),
        Box::new(SUBMISSIONS_TOTAL.clone()),
        Box::new(SUBMISSION_OUTCOMES_TOTAL.clone()),
        Box::new(FRAMES_DELIVERED_TOTAL.clone()),
        Box::new(PLAYBACKS_CANCELLED_TOTAL.clone()),
        Box::new(PLAYBACKS_FINISHED_TOTAL.clone()),
        Box::new(MANUAL_COMMANDS_TOTAL.clone()),
        Box::new(SUBMISSION_DURATION_SECONDS.clone()),
    ];

    for c in collectors {
        if let Err(e) = REGISTRY.register(c) {
            tracing::warn!("metric registration skipped: {e}");
        }
    }
}

/// Serialize all registered metrics to the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics_returns_string() {
        register_metrics();
        // A second registration must not panic
        register_metrics();
        SUBMISSIONS_TOTAL.with_label_values(&["practice"]).inc();
        let output = gather_metrics();
        assert!(output.contains("robomaze_submissions_total"));
    }

    #[test]
    fn test_metric_increments() {
        // ACTIVE_PLAYBACKS is shared with the playback tests, so only exercise it
        ACTIVE_PLAYBACKS.inc();
        ACTIVE_PLAYBACKS.dec();

        let before = FRAMES_DELIVERED_TOTAL.get();
        FRAMES_DELIVERED_TOTAL.inc();
        assert!(FRAMES_DELIVERED_TOTAL.get() > before);

        SUBMISSION_OUTCOMES_TOTAL.with_label_values(&["won"]).inc();
        MANUAL_COMMANDS_TOTAL.with_label_values(&["forward"]).inc();
        SUBMISSION_DURATION_SECONDS.observe(0.4);
    }
}
