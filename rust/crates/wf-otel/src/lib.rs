//! OpenTelemetry tracing setup for the workflow orchestration service
//! (spec.md §7.1): OTLP export plus an `EnvFilter`-driven `tracing`
//! subscriber.

pub mod setup;

pub use setup::init_telemetry;
