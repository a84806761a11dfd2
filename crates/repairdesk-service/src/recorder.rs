//! Best-effort audit recording.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use repairdesk_core::models::audit::{AuditAction, CreateAuditLogEntry};
use repairdesk_core::repository::{AuditLogRepository, RepairStore};
use tracing::warn;

use crate::context::RequestContext;

/// One mutating action to record.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: AuditAction,
    pub resource_type: &'static str,
    pub resource_id: Option<String>,
    pub details: serde_json::Value,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        resource_type: &'static str,
        resource_id: impl ToString,
    ) -> Self {
        Self {
            action,
            resource_type,
            resource_id: Some(resource_id.to_string()),
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Appends audit entries after the business write has committed.
///
/// Failures are logged and dropped: [`AuditRecorder::record`] returns `()`.
pub struct AuditRecorder<S: RepairStore> {
    store: Arc<S>,
}

impl<S: RepairStore> AuditRecorder<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub async fn record(&self, ctx: &RequestContext, at: DateTime<Utc>, event: AuditEvent) {
        let Some(actor) = ctx.actor() else {
            warn!(action = %event.action, "audit event without an actor dropped");
            return;
        };

        let client = ctx.client();
        let entry = CreateAuditLogEntry {
            actor_id: actor.id,
            action: event.action,
            resource_type: event.resource_type.to_string(),
            resource_id: event.resource_id,
            details: event.details,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
            timestamp: at,
        };

        if let Err(e) = self.store.audit_log().append(entry).await {
            warn!(
                action = %event.action,
                actor_id = %actor.id,
                error = %e,
                "failed to record audit entry"
            );
        }
    }
}
