//! Audit log queries.

use std::sync::Arc;

use repairdesk_core::error::RepairResult;
use repairdesk_core::models::audit::{AuditLogEntry, AuditLogFilter};
use repairdesk_core::models::capability::Capability;
use repairdesk_core::repository::{
    AuditFacets, AuditLogRepository, PaginatedResult, Pagination, RepairStore,
};

use crate::context::RequestContext;
use crate::deps::Deps;

/// A page of audit entries plus the distinct values usable as filters.
#[derive(Debug, Clone)]
pub struct AuditLogPage {
    pub entries: PaginatedResult<AuditLogEntry>,
    pub facets: AuditFacets,
}

pub struct AuditService<S: RepairStore> {
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> Clone for AuditService<S> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<S: RepairStore> AuditService<S> {
    pub(crate) fn new(deps: Arc<Deps<S>>) -> Self {
        Self { deps }
    }

    /// Entries newest first.
    pub async fn list_audit_logs(
        &self,
        ctx: &RequestContext,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> RepairResult<AuditLogPage> {
        self.deps
            .require_staff(ctx, &[Capability::AuditRead])
            .await?;
        let audit_log = self.deps.store.audit_log();
        let entries = audit_log.list(filter.clone(), pagination).await?;
        let facets = audit_log.facets(filter).await?;
        Ok(AuditLogPage { entries, facets })
    }
}
