//! `rexbot-runtime` – The Supervision Loop
//!
//! Composes the kernel's policies and the HAL's devices into one long-running
//! service.
//!
//! # Modules
//!
//! - [`lifecycle`] – [`ServiceLifecycle`][lifecycle::ServiceLifecycle]:
//!   starts every collaborator in order, ticks the
//!   [`Supervisor`][lifecycle::Supervisor] once per period until the
//!   [`ShutdownSignal`][rexbot_kernel::ShutdownSignal] is raised, then tears
//!   everything down in reverse.
//! - [`store`] – [`ConfigStore`][store::ConfigStore] and the TOML-backed
//!   [`FileConfigStore`][store::FileConfigStore] that keeps camera settings
//!   across restarts.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   initialises the global `tracing` subscriber with an optional OTLP span
//!   exporter.  Set `OTEL_EXPORTER_OTLP_ENDPOINT` to enable live trace export
//!   to Jaeger, Grafana Tempo, or any OTLP-compatible collector.

pub mod lifecycle;
pub mod store;
pub mod telemetry;

pub use lifecycle::{
    Collaborators, LifecycleState, OPERATOR_ENDPOINT, ServiceLifecycle, Supervisor,
    SupervisorSettings, TickReport,
};
pub use store::{ConfigStore, FileConfigStore};
pub use telemetry::{TracerProviderGuard, init_tracing};
