// SPDX-FileCopyrightText: 2026 Didpool Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; with no recorder installed every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all didpool metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "didpool_allocations_total",
        "DIDs handed out, by selection strategy"
    );
    describe_counter!(
        "didpool_fallback_total",
        "Requests answered with the fallback number because the pool was empty"
    );
    describe_counter!("didpool_cycle_resets_total", "Rotation cycle resets");
    describe_counter!(
        "didpool_rotation_conflicts_total",
        "Rotation state writes that lost a race and were retried"
    );
    describe_counter!(
        "didpool_side_effects_total",
        "Background side effects by kind and outcome"
    );
    describe_gauge!("didpool_pool_active", "Active DIDs per tenant");
    describe_gauge!(
        "didpool_pool_eligible",
        "Active DIDs at or above the reputation threshold per tenant"
    );
    describe_gauge!(
        "didpool_pool_with_capacity",
        "Active DIDs with daily capacity left per tenant"
    );
    describe_histogram!(
        "didpool_selection_seconds",
        "Time spent loading and ranking candidates"
    );
}

/// Count a successful allocation.
pub fn record_allocation(strategy: &'static str) {
    metrics::counter!("didpool_allocations_total", "strategy" => strategy).increment(1);
}

/// Count a fallback response.
pub fn record_fallback() {
    metrics::counter!("didpool_fallback_total").increment(1);
}

/// Count a cycle reset.
pub fn record_cycle_reset() {
    metrics::counter!("didpool_cycle_resets_total").increment(1);
}

/// Count a lost rotation-state race.
pub fn record_conflict() {
    metrics::counter!("didpool_rotation_conflicts_total").increment(1);
}

/// Count a side effect outcome (`delivered`, `failed`, `dropped`).
pub fn record_side_effect(kind: &'static str, outcome: &'static str) {
    metrics::counter!("didpool_side_effects_total", "kind" => kind, "outcome" => outcome)
        .increment(1);
}

/// Publish the pool counts observed by the last selection for a tenant.
pub fn set_pool_stats(tenant: &str, active: usize, eligible: usize, with_capacity: usize) {
    let tenant = tenant.to_string();
    metrics::gauge!("didpool_pool_active", "tenant" => tenant.clone()).set(active as f64);
    metrics::gauge!("didpool_pool_eligible", "tenant" => tenant.clone()).set(eligible as f64);
    metrics::gauge!("didpool_pool_with_capacity", "tenant" => tenant).set(with_capacity as f64);
}

/// Record candidate selection latency.
pub fn record_selection_latency(seconds: f64) {
    metrics::histogram!("didpool_selection_seconds").record(seconds);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn helpers_render_through_a_local_recorder() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            register_metrics();
            record_allocation("unused_in_cycle");
            record_allocation("unused_in_cycle");
            record_fallback();
            set_pool_stats("acme", 3, 2, 1);
        });

        let rendered = handle.render();
        assert!(rendered.contains("didpool_allocations_total{strategy=\"unused_in_cycle\"} 2"));
        assert!(rendered.contains("didpool_fallback_total 1"));
        assert!(rendered.contains("didpool_pool_eligible{tenant=\"acme\"} 2"));
    }

    #[test]
    fn helpers_are_noops_without_recorder() {
        record_conflict();
        record_cycle_reset();
        record_side_effect("call_record", "delivered");
        record_selection_latency(0.002);
    }
}
