//! Relay 指标记录模块
//!
//! 入站事件、出站投递与队列深度的 Prometheus 指标。

use metrics::{counter, gauge, histogram};

/// 记录入站事件 (已解析目的地)
pub fn record_event_received(destination: &str) {
    counter!(
        "webhook_relay_events_received_total",
        "destination" => destination.to_string()
    )
    .increment(1);
}

/// 记录被丢弃的入站事件
pub fn record_event_dropped(reason: &str) {
    counter!(
        "webhook_relay_events_dropped_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录被拒绝的入站请求
pub fn record_request_rejected(reason: &str) {
    counter!(
        "webhook_relay_requests_rejected_total",
        "reason" => reason.to_string()
    )
    .increment(1);
}

/// 记录一次成功投递
pub fn record_delivery_success(destination: &str, events: usize, elapsed_ms: f64) {
    counter!(
        "webhook_relay_batches_delivered_total",
        "destination" => destination.to_string()
    )
    .increment(1);
    counter!(
        "webhook_relay_events_delivered_total",
        "destination" => destination.to_string()
    )
    .increment(events as u64);
    histogram!(
        "webhook_relay_delivery_latency_ms",
        "destination" => destination.to_string()
    )
    .record(elapsed_ms);
}

/// 记录一次失败投递 (批次已回队)
pub fn record_delivery_failure(destination: &str, events: usize) {
    counter!(
        "webhook_relay_delivery_failures_total",
        "destination" => destination.to_string()
    )
    .increment(1);
    counter!(
        "webhook_relay_events_requeued_total",
        "destination" => destination.to_string()
    )
    .increment(events as u64);
}

/// 记录队列深度
pub fn record_queue_depth(destination: &str, pending: usize, in_flight: usize) {
    gauge!(
        "webhook_relay_pending_events",
        "destination" => destination.to_string()
    )
    .set(pending as f64);
    gauge!(
        "webhook_relay_in_flight_events",
        "destination" => destination.to_string()
    )
    .set(in_flight as f64);
}
