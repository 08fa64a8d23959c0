//! Prometheus metrics (spec.md §6 `GET /metrics`), grounded in
//! `original_source/utils/metrics.py`. Uses the `metrics` crate's facade so
//! the recorder (installed once at process startup by `services/api`) can be
//! swapped without touching call sites.

use metrics::{counter, gauge, histogram};

pub fn record_workflow_submitted() {
    counter!("workflows_submitted_total").increment(1);
}

pub fn record_workflow_completed(status: &str) {
    counter!("workflows_completed_total", "status" => status.to_string()).increment(1);
}

pub fn record_workflow_duration_seconds(seconds: f64) {
    histogram!("workflow_execution_duration_seconds").record(seconds);
}

pub fn set_active_workflows(count: f64) {
    gauge!("active_workflows_count").set(count);
}

pub fn record_step_submitted(app: &str) {
    counter!("steps_submitted_total", "app" => app.to_string()).increment(1);
}

pub fn record_step_completed(app: &str, status: &str) {
    counter!("steps_completed_total", "app" => app.to_string(), "status" => status.to_string()).increment(1);
}

pub fn record_step_duration_seconds(app: &str, seconds: f64) {
    histogram!("step_execution_duration_seconds", "app" => app.to_string()).record(seconds);
}

pub fn record_scheduler_query_duration_seconds(seconds: f64) {
    histogram!("scheduler_query_duration_seconds").record(seconds);
}

pub fn record_scheduler_query_error() {
    counter!("scheduler_query_errors_total").increment(1);
}

pub fn record_scheduler_submit_error(app: &str) {
    counter!("scheduler_submit_errors_total", "app" => app.to_string()).increment(1);
}

pub fn record_poll_cycle() {
    counter!("executor_poll_cycles_total").increment(1);
}

pub fn record_poll_duration_seconds(seconds: f64) {
    histogram!("executor_poll_duration_seconds").record(seconds);
}

pub fn record_executor_error(error_type: &str) {
    counter!("executor_errors_total", "error_type" => error_type.to_string()).increment(1);
}
