//! Authorization engine: role gates, customer ownership and staff
//! capability checks.

use std::collections::BTreeSet;
use std::sync::Arc;

use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::identity::Role;
use repairdesk_core::repository::{PermissionRepository, RepairStore};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::{Actor, RequestContext};
use crate::error::AuthzError;

/// Owner of the resource a request touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ownership {
    pub customer_id: Uuid,
}

impl Ownership {
    pub fn customer(customer_id: Uuid) -> Self {
        Self { customer_id }
    }
}

/// Admit the caller only if their role is one of `roles`.
pub fn require_role<'a>(
    ctx: &'a RequestContext,
    roles: &[Role],
) -> Result<&'a Actor, AuthzError> {
    let actor = ctx.actor().ok_or(AuthzError::Unauthenticated)?;
    if roles.contains(&actor.role) {
        Ok(actor)
    } else {
        Err(AuthzError::RoleNotAllowed { role: actor.role })
    }
}

/// Makes admit/deny decisions. Never writes to the store.
pub struct Authorizer<S: RepairStore> {
    store: Arc<S>,
}

impl<S: RepairStore> Authorizer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Admit the caller if:
    /// - they are an admin;
    /// - they are a customer and `ownership` is absent or names their
    ///   profile;
    /// - they are staff holding at least one of `required`.
    pub async fn authorize(
        &self,
        ctx: &RequestContext,
        required: &[Capability],
        ownership: Option<Ownership>,
    ) -> RepairResult<()> {
        let actor = ctx.actor().ok_or(AuthzError::Unauthenticated)?;

        match actor.role {
            Role::Admin => Ok(()),
            Role::Customer => match ownership {
                Some(owner) if actor.customer_id != Some(owner.customer_id) => {
                    Err(AuthzError::AccessDenied.into())
                }
                _ => Ok(()),
            },
            Role::Staff => {
                let granted = self.capabilities(ctx, actor.id).await?;
                if required.iter().any(|cap| granted.contains(cap)) {
                    Ok(())
                } else {
                    debug!(staff_id = %actor.id, "missing capability");
                    Err(AuthzError::MissingPermission {
                        required: required.to_vec(),
                    }
                    .into())
                }
            }
        }
    }

    /// Non-failing check for UI hints. A staff member whose grants cannot
    /// be loaded is treated as holding nothing.
    pub async fn has_permission(&self, ctx: &RequestContext, capability: Capability) -> bool {
        let Some(actor) = ctx.actor() else {
            return false;
        };

        match actor.role {
            Role::Admin => true,
            Role::Customer => false,
            Role::Staff => match self.capabilities(ctx, actor.id).await {
                Ok(granted) => granted.contains(&capability),
                Err(e) => {
                    warn!(staff_id = %actor.id, error = %e, "could not load capabilities");
                    false
                }
            },
        }
    }

    async fn capabilities<'a>(
        &self,
        ctx: &'a RequestContext,
        staff_id: Uuid,
    ) -> RepairResult<&'a BTreeSet<Capability>> {
        ctx.capability_cache()
            .get_or_try_init(|| async {
                let grants = self.store.permissions().list_grants(staff_id).await?;
                Ok::<_, RepairError>(grants.into_iter().map(|g| g.capability).collect())
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn require_role_checks_membership() {
        let staff = RequestContext::for_actor(Actor::staff(Uuid::new_v4()));
        assert!(require_role(&staff, &[Role::Admin, Role::Staff]).is_ok());
        assert_eq!(
            require_role(&staff, &[Role::Admin]).unwrap_err(),
            AuthzError::RoleNotAllowed { role: Role::Staff }
        );
    }

    #[test]
    fn require_role_needs_an_actor() {
        let ctx = RequestContext::anonymous();
        assert_eq!(
            require_role(&ctx, &[Role::Customer]).unwrap_err(),
            AuthzError::Unauthenticated
        );
    }
}
