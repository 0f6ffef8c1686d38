// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions.
//!
//! Uses the metrics-rs facade; no recorder is installed here, so metrics
//! are free until a binary installs one.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Doppel metric descriptions.
pub fn register_metrics() {
    describe_counter!(
        "doppel_messages_enqueued_total",
        "Inbound messages accepted into a channel queue"
    );
    describe_counter!(
        "doppel_replies_delivered_total",
        "Replies acknowledged by the platform"
    );
    describe_counter!(
        "doppel_items_failed_total",
        "Items that reached a terminal failed state, by reason"
    );
    describe_counter!(
        "doppel_generation_failures_total",
        "Failed reply generation attempts"
    );
    describe_counter!(
        "doppel_connectivity_transitions_total",
        "Connectivity state changes, by target state"
    );
    describe_counter!(
        "doppel_journal_errors_total",
        "Queue snapshots that could not be written to storage"
    );
    describe_gauge!("doppel_queue_pending", "Pending items per channel");
    describe_histogram!(
        "doppel_generation_latency_seconds",
        "Text-generation call latency in seconds"
    );
}

pub(crate) fn record_generation_failure(channel: &str) {
    metrics::counter!("doppel_generation_failures_total", "channel" => channel.to_string())
        .increment(1);
}

pub(crate) fn set_pending(channel: &str, pending: usize) {
    metrics::gauge!("doppel_queue_pending", "channel" => channel.to_string()).set(pending as f64);
}
