//! Per-request caller context.

use std::collections::BTreeSet;

use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::identity::{Identity, Role};
use tokio::sync::OnceCell;
use uuid::Uuid;

/// The authenticated caller, as supplied by the session provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
    /// Customer profile of a `CUSTOMER` actor.
    pub customer_id: Option<Uuid>,
}

impl Actor {
    pub fn admin(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Admin,
            customer_id: None,
        }
    }

    pub fn staff(id: Uuid) -> Self {
        Self {
            id,
            role: Role::Staff,
            customer_id: None,
        }
    }

    pub fn customer(id: Uuid, customer_id: Uuid) -> Self {
        Self {
            id,
            role: Role::Customer,
            customer_id: Some(customer_id),
        }
    }
}

impl From<&Identity> for Actor {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            role: identity.role,
            customer_id: identity.customer_id,
        }
    }
}

/// Network details copied into audit entries.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// Everything a service call knows about who is calling.
///
/// A staff actor's capabilities are loaded at most once per context and
/// cached here. Contexts are never shared between requests, so a grant
/// change takes effect on the next request.
#[derive(Debug, Default)]
pub struct RequestContext {
    actor: Option<Actor>,
    client: ClientInfo,
    capabilities: OnceCell<BTreeSet<Capability>>,
}

impl RequestContext {
    pub fn new(actor: Option<Actor>, client: ClientInfo) -> Self {
        Self {
            actor,
            client,
            capabilities: OnceCell::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_actor(actor: Actor) -> Self {
        Self::new(Some(actor), ClientInfo::default())
    }

    pub fn actor(&self) -> Option<&Actor> {
        self.actor.as_ref()
    }

    pub fn client(&self) -> &ClientInfo {
        &self.client
    }

    pub(crate) fn capability_cache(&self) -> &OnceCell<BTreeSet<Capability>> {
        &self.capabilities
    }
}
