//! Identity administration and staff permission grants.

use std::sync::Arc;

use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::audit::AuditAction;
use repairdesk_core::models::capability::{Capability, PermissionGrant};
use repairdesk_core::models::identity::{
    CreateIdentity, Identity, IdentityFilter, IdentityStatus, Role, UpdateIdentity,
};
use repairdesk_core::repository::{
    IdentityRepository, PaginatedResult, Pagination, PermissionRepository, RepairStore,
};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::config::BootstrapAdmin;
use crate::context::RequestContext;
use crate::deps::Deps;
use crate::recorder::AuditEvent;

/// Admin-only management of identities and their capabilities.
pub struct IdentityService<S: RepairStore> {
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> Clone for IdentityService<S> {
    fn clone(&self) -> Self {
        Self {
            deps: Arc::clone(&self.deps),
        }
    }
}

impl<S: RepairStore> IdentityService<S> {
    pub(crate) fn new(deps: Arc<Deps<S>>) -> Self {
        Self { deps }
    }

    pub async fn create_identity(
        &self,
        ctx: &RequestContext,
        input: CreateIdentity,
    ) -> RepairResult<Identity> {
        self.deps.require_admin(ctx)?;
        self.ensure_username_free(&input.username, None).await?;

        let identity = self.deps.store.identities().create(input).await?;
        info!(identity_id = %identity.id, role = %identity.role, "identity created");

        self.deps
            .recorder
            .record(
                ctx,
                self.deps.clock.now(),
                AuditEvent::new(AuditAction::CreateUser, "identity", identity.id).with_details(
                    json!({
                        "username": identity.username,
                        "role": identity.role,
                        "customer_id": identity.customer_id,
                    }),
                ),
            )
            .await;

        Ok(identity)
    }

    pub async fn update_identity(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        input: UpdateIdentity,
    ) -> RepairResult<Identity> {
        let actor = self.deps.require_admin(ctx)?;
        if id == actor.id && input.status == Some(IdentityStatus::Disabled) {
            return Err(RepairError::validation(
                "status",
                "administrators cannot disable themselves",
            ));
        }

        let existing = self.deps.store.identities().get_by_id(id).await?;
        if let Some(username) = input.username.as_deref() {
            if username != existing.username {
                self.ensure_username_free(username, Some(id)).await?;
            }
        }

        let changed: Vec<&str> = [
            ("username", input.username.is_some()),
            ("password", input.password.is_some()),
            ("email", input.email.is_some()),
            ("phone", input.phone.is_some()),
            ("status", input.status.is_some()),
        ]
        .into_iter()
        .filter_map(|(field, set)| set.then_some(field))
        .collect();

        let identity = self.deps.store.identities().update(id, input).await?;

        self.deps
            .recorder
            .record(
                ctx,
                self.deps.clock.now(),
                AuditEvent::new(AuditAction::UpdateUser, "identity", id)
                    .with_details(json!({ "changed": changed })),
            )
            .await;

        Ok(identity)
    }

    /// Soft delete. The identity stays queryable as `DISABLED`.
    pub async fn disable_identity(&self, ctx: &RequestContext, id: Uuid) -> RepairResult<Identity> {
        let actor = self.deps.require_admin(ctx)?;
        if id == actor.id {
            return Err(RepairError::validation(
                "id",
                "administrators cannot disable themselves",
            ));
        }

        let identity = self.deps.store.identities().disable(id).await?;
        info!(identity_id = %id, "identity disabled");

        self.deps
            .recorder
            .record(
                ctx,
                self.deps.clock.now(),
                AuditEvent::new(AuditAction::DisableUser, "identity", id)
                    .with_details(json!({ "username": identity.username })),
            )
            .await;

        Ok(identity)
    }

    pub async fn get_identity(&self, ctx: &RequestContext, id: Uuid) -> RepairResult<Identity> {
        self.deps.require_admin(ctx)?;
        self.deps.store.identities().get_by_id(id).await
    }

    pub async fn list_identities(
        &self,
        ctx: &RequestContext,
        filter: IdentityFilter,
        pagination: Pagination,
    ) -> RepairResult<PaginatedResult<Identity>> {
        self.deps.require_admin(ctx)?;
        self.deps.store.identities().list(filter, pagination).await
    }

    /// Replace every capability held by a staff identity.
    pub async fn grant_permissions(
        &self,
        ctx: &RequestContext,
        staff_id: Uuid,
        capabilities: Vec<Capability>,
    ) -> RepairResult<Vec<PermissionGrant>> {
        let actor = self.deps.require_admin(ctx)?;
        self.staff_target(staff_id).await?;

        let before = self.current_capabilities(staff_id).await?;
        let now = self.deps.clock.now();
        let grants = self
            .deps
            .store
            .permissions()
            .replace_grants(staff_id, capabilities, actor.id, now)
            .await?;
        let after: Vec<Capability> = grants.iter().map(|g| g.capability).collect();
        info!(staff_id = %staff_id, granted = after.len(), "permissions replaced");

        self.deps
            .recorder
            .record(
                ctx,
                now,
                AuditEvent::new(AuditAction::AssignPermission, "identity", staff_id)
                    .with_details(json!({ "before": before, "after": after })),
            )
            .await;

        Ok(grants)
    }

    pub async fn list_permissions(
        &self,
        ctx: &RequestContext,
        staff_id: Uuid,
    ) -> RepairResult<Vec<PermissionGrant>> {
        self.deps.require_admin(ctx)?;
        self.staff_target(staff_id).await?;
        self.deps.store.permissions().list_grants(staff_id).await
    }

    /// Create the configured administrator unless an admin already exists.
    /// Returns the new identity, if one was created.
    pub async fn ensure_admin(&self, admin: &BootstrapAdmin) -> RepairResult<Option<Identity>> {
        let admins = self
            .deps
            .store
            .identities()
            .count(IdentityFilter {
                role: Some(Role::Admin),
                status: None,
            })
            .await?;
        if admins > 0 {
            return Ok(None);
        }

        let identity = self
            .deps
            .store
            .identities()
            .create(CreateIdentity {
                username: admin.username.clone(),
                password: admin.password.clone(),
                role: Role::Admin,
                email: None,
                phone: None,
                customer_name: None,
                customer_address: None,
            })
            .await?;
        info!(identity_id = %identity.id, username = %identity.username, "bootstrap admin created");
        Ok(Some(identity))
    }

    async fn ensure_username_free(&self, username: &str, owner: Option<Uuid>) -> RepairResult<()> {
        match self.deps.store.identities().get_by_username(username).await {
            Ok(existing) if Some(existing.id) != owner => Err(RepairError::AlreadyExists {
                entity: format!("identity '{username}'"),
            }),
            Ok(_) | Err(RepairError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn staff_target(&self, staff_id: Uuid) -> RepairResult<Identity> {
        let target = self.deps.store.identities().get_by_id(staff_id).await?;
        if target.role != Role::Staff {
            return Err(RepairError::InvalidTarget {
                reason: format!("permissions can only be granted to STAFF, not {}", target.role),
            });
        }
        Ok(target)
    }

    async fn current_capabilities(&self, staff_id: Uuid) -> RepairResult<Vec<Capability>> {
        let grants = self.deps.store.permissions().list_grants(staff_id).await?;
        Ok(grants.into_iter().map(|g| g.capability).collect())
    }
}
