//! Assembles orchestrators from a [`ServiceConfig`].

use crate::backend::{BackendClient, RelayTransport, RestBackend};
use crate::config::ServiceConfig;
use anyhow::{Context, Result};
use escalation_core::memory::{
    InMemoryAuditLog, InMemoryTicketStore, RecordingTransport, StaticStaffDirectory,
};
use escalation_core::{Dispatcher, EscalationOrchestrator, StaffMember, Transports};
use std::path::Path;
use std::sync::Arc;

/// Orchestrator wired to the hosted backend.
pub fn live_orchestrator(config: &ServiceConfig) -> Result<EscalationOrchestrator> {
    let backend_config = config.backend.as_ref().context(
        "No backend configured: set [backend] in the config file or ESCALATION_BACKEND_URL/ESCALATION_BACKEND_KEY",
    )?;
    let client = BackendClient::new(backend_config)?;
    let backend = Arc::new(RestBackend::new(client.clone()));
    let relay = Arc::new(RelayTransport::new(client));

    let transports = Transports::default()
        .with_email(relay.clone())
        .with_sms(relay.clone())
        .with_push(relay);
    let dispatcher =
        Dispatcher::with_config(transports, backend.clone(), config.dispatch.to_dispatch_config());

    Ok(EscalationOrchestrator::new(
        backend.clone(),
        backend,
        dispatcher,
    ))
}

/// In-memory collaborators for a dry run: nothing leaves the process.
pub struct DryRun {
    pub orchestrator: EscalationOrchestrator,
    pub transport: Arc<RecordingTransport>,
    pub audit: Arc<InMemoryAuditLog>,
}

pub fn dry_run_orchestrator(config: &ServiceConfig, roster: Vec<StaffMember>) -> DryRun {
    let transport = Arc::new(RecordingTransport::new());
    let audit = Arc::new(InMemoryAuditLog::new());
    let transports = Transports::default()
        .with_email(transport.clone())
        .with_sms(transport.clone())
        .with_push(transport.clone());
    let dispatcher =
        Dispatcher::with_config(transports, audit.clone(), config.dispatch.to_dispatch_config());

    DryRun {
        orchestrator: EscalationOrchestrator::new(
            Arc::new(InMemoryTicketStore::new()),
            Arc::new(StaticStaffDirectory::new(roster)),
            dispatcher,
        ),
        transport,
        audit,
    }
}

/// Read a staff roster (JSON array of staff members) for dry runs.
pub fn load_roster(path: &Path) -> Result<Vec<StaffMember>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read staff roster {}", path.display()))?;
    serde_json::from_str(&raw).context("Failed to parse staff roster JSON")
}
