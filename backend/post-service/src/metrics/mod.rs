//! Prometheus metrics for post-service.
//!
//! Exposes cache, event-bus and gRPC collectors and an HTTP handler for the
//! `/metrics` endpoint.

use actix_web::HttpResponse;
use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, Encoder, HistogramVec,
    IntCounterVec, IntGauge, TextEncoder,
};
use std::time::Instant;

lazy_static! {
    /// Cache reads by entry kind (post, recent) and outcome (hit, miss, error).
    pub static ref POST_CACHE_EVENTS: IntCounterVec = register_int_counter_vec!(
        "post_cache_events_total",
        "Post cache reads segmented by entry kind and outcome",
        &["kind", "event"]
    )
    .expect("failed to register post_cache_events_total");

    /// Cache writes and deletes by entry kind and result (success, error).
    pub static ref POST_CACHE_WRITE_TOTAL: IntCounterVec = register_int_counter_vec!(
        "post_cache_write_total",
        "Post cache writes segmented by entry kind and result",
        &["kind", "result"]
    )
    .expect("failed to register post_cache_write_total");

    /// Events published by type (created, liked) and result.
    pub static ref POST_EVENTS_PUBLISHED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "post_events_published_total",
        "Post events published segmented by event type and result",
        &["event_type", "result"]
    )
    .expect("failed to register post_events_published_total");

    /// Currently open StreamPosts subscriptions.
    pub static ref POST_STREAM_SUBSCRIBERS: IntGauge = register_int_gauge!(
        "post_stream_subscribers",
        "Number of active StreamPosts subscriptions"
    )
    .expect("failed to register post_stream_subscribers");

    /// gRPC requests by method and status code.
    pub static ref GRPC_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "post_grpc_requests_total",
        "gRPC requests segmented by method and status code",
        &["method", "code"]
    )
    .expect("failed to register post_grpc_requests_total");

    pub static ref GRPC_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "post_grpc_request_duration_seconds",
        "gRPC request duration segmented by method",
        &["method"]
    )
    .expect("failed to register post_grpc_request_duration_seconds");
}

/// Records one gRPC call: count by status code and latency.
///
/// `complete` records once; a guard dropped without completing counts as
/// code "2" (UNKNOWN), which is what a panicking handler produces.
pub struct RequestGuard {
    method: &'static str,
    started: Instant,
    completed: bool,
}

impl RequestGuard {
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            started: Instant::now(),
            completed: false,
        }
    }

    pub fn complete(mut self, code: &str) {
        self.record(code);
    }

    fn record(&mut self, code: &str) {
        if self.completed {
            return;
        }
        self.completed = true;
        GRPC_REQUESTS_TOTAL
            .with_label_values(&[self.method, code])
            .inc();
        GRPC_REQUEST_DURATION_SECONDS
            .with_label_values(&[self.method])
            .observe(self.started.elapsed().as_secs_f64());
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.record("2");
    }
}

/// Actix handler that renders Prometheus metrics in text format.
pub async fn serve_metrics() -> HttpResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        return HttpResponse::InternalServerError().body(err.to_string());
    }

    HttpResponse::Ok()
        .content_type(encoder.format_type())
        .body(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_guard_records_once() {
        let before = GRPC_REQUESTS_TOTAL
            .with_label_values(&["GuardTest", "0"])
            .get();

        RequestGuard::new("GuardTest").complete("0");

        let after = GRPC_REQUESTS_TOTAL
            .with_label_values(&["GuardTest", "0"])
            .get();
        assert_eq!(after, before + 1);
        assert_eq!(
            GRPC_REQUESTS_TOTAL
                .with_label_values(&["GuardTest", "2"])
                .get(),
            0
        );
    }

    #[test]
    fn test_dropped_guard_counts_unknown() {
        let before = GRPC_REQUESTS_TOTAL
            .with_label_values(&["DroppedGuardTest", "2"])
            .get();

        drop(RequestGuard::new("DroppedGuardTest"));

        let after = GRPC_REQUESTS_TOTAL
            .with_label_values(&["DroppedGuardTest", "2"])
            .get();
        assert_eq!(after, before + 1);
    }
}
