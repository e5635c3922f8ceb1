//! Escalation service: configuration, backend bridges and wiring for the
//! `escalation` binary.

pub mod backend;
pub mod config;
pub mod service;

pub use config::{BackendConfig, DispatchSettings, ServiceConfig};
pub use service::{dry_run_orchestrator, live_orchestrator, load_roster, DryRun};
