use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    pub static ref SSE_CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        "sse_connections_active",
        "Number of active SSE connections"
    )
    .unwrap();

    // Quiz Metrics
    pub static ref QUIZ_SESSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_sessions_total",
        "Total number of quiz sessions by lifecycle status",
        &["mode", "status"]
    )
    .unwrap();

    pub static ref QUIZ_SESSIONS_ACTIVE: IntGauge = register_int_gauge!(
        "quiz_sessions_active",
        "Number of quiz sessions currently running"
    )
    .unwrap();

    pub static ref QUIZ_TURNS_RESOLVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_turns_resolved_total",
        "Total number of resolved turns",
        &["trigger"]
    )
    .unwrap();

    pub static ref QUIZ_ANSWERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_answers_total",
        "Total number of answers recorded",
        &["player_kind", "correct"]
    )
    .unwrap();

    pub static ref QUESTION_BATCHES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "question_batches_total",
        "Total number of question generation batches",
        &["status"]
    )
    .unwrap();

    pub static ref STALE_TIMER_EVENTS_TOTAL: IntCounter = register_int_counter!(
        "stale_timer_events_total",
        "Timer deliveries dropped because their turn was no longer current"
    )
    .unwrap();

    // Storage Metrics (Redis)
    pub static ref HISTORY_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "history_operations_total",
        "Total number of history store operations",
        &["operation", "status"]
    )
    .unwrap();

    pub static ref HISTORY_OPERATION_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "history_operation_duration_seconds",
        "History store operation duration in seconds",
        &["operation"],
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .unwrap();
}

/// Renders all metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("Failed to convert metrics to UTF-8: {}", e)))
}

/// Helper: track history store operation with metrics
pub async fn track_history_operation<F, T>(operation: &str, future: F) -> Result<T, anyhow::Error>
where
    F: std::future::Future<Output = Result<T, anyhow::Error>>,
{
    let start = std::time::Instant::now();
    let result = future.await;
    let duration = start.elapsed().as_secs_f64();

    let status = if result.is_ok() { "success" } else { "error" };

    HISTORY_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();

    HISTORY_OPERATION_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration);

    result
}

/// Record one answer, human or simulated
pub fn record_answer(is_human: bool, correct: bool) {
    let kind = if is_human { "human" } else { "opponent" };
    QUIZ_ANSWERS_TOTAL
        .with_label_values(&[kind, if correct { "true" } else { "false" }])
        .inc();
}
