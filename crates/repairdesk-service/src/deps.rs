//! Collaborators shared by every service.

use std::sync::Arc;

use repairdesk_core::clock::Clock;
use repairdesk_core::error::RepairResult;
use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::identity::Role;
use repairdesk_core::repository::RepairStore;

use crate::authz::{Authorizer, require_role};
use crate::config::ServiceConfig;
use crate::context::{Actor, RequestContext};
use crate::recorder::AuditRecorder;

pub(crate) struct Deps<S: RepairStore> {
    pub(crate) store: Arc<S>,
    pub(crate) authorizer: Authorizer<S>,
    pub(crate) recorder: AuditRecorder<S>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) config: ServiceConfig,
}

impl<S: RepairStore> Deps<S> {
    pub(crate) fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: ServiceConfig) -> Self {
        Self {
            authorizer: Authorizer::new(Arc::clone(&store)),
            recorder: AuditRecorder::new(Arc::clone(&store)),
            store,
            clock,
            config,
        }
    }

    /// Gate for back-office operations: the caller must be an admin or a
    /// staff member holding one of `required`.
    pub(crate) async fn require_staff(
        &self,
        ctx: &RequestContext,
        required: &[Capability],
    ) -> RepairResult<Actor> {
        let actor = *require_role(ctx, &[Role::Admin, Role::Staff])?;
        self.authorizer.authorize(ctx, required, None).await?;
        Ok(actor)
    }

    pub(crate) fn require_admin(&self, ctx: &RequestContext) -> RepairResult<Actor> {
        Ok(*require_role(ctx, &[Role::Admin])?)
    }
}
