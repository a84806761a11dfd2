//! RepairDesk Service — authorization, audit recording and the case
//! lifecycle services.
//!
//! Every service is generic over a [`RepairStore`] so this crate has no
//! dependency on the database crate. [`RepairDesk`] wires them together
//! around one store, clock and configuration.

pub mod audit;
pub mod authz;
pub mod case;
pub mod config;
pub mod context;
mod deps;
pub mod error;
pub mod identity;
pub mod policy;
pub mod portal;
pub mod recorder;
pub mod registry;
pub mod shipment;
pub mod stats;
pub mod views;

use std::sync::Arc;

use repairdesk_core::clock::Clock;
use repairdesk_core::repository::RepairStore;

pub use audit::{AuditLogPage, AuditService};
pub use authz::{Authorizer, Ownership, require_role};
pub use case::{CaseService, NewCase, StatusChange};
pub use config::{BootstrapAdmin, ServiceConfig};
pub use context::{Actor, ClientInfo, RequestContext};
pub use error::AuthzError;
pub use identity::IdentityService;
pub use policy::TransitionPolicy;
pub use portal::PortalService;
pub use recorder::{AuditEvent, AuditRecorder};
pub use registry::RegistryService;
pub use shipment::{NewShipment, ShipmentService};
pub use stats::{FleetStatistics, StatsService};

use crate::deps::Deps;

/// Every service over one shared store.
pub struct RepairDesk<S: RepairStore> {
    pub identities: IdentityService<S>,
    pub registry: RegistryService<S>,
    pub cases: CaseService<S>,
    pub shipments: ShipmentService<S>,
    pub portal: PortalService<S>,
    pub stats: StatsService<S>,
    pub audit: AuditService<S>,
    deps: Arc<Deps<S>>,
}

impl<S: RepairStore> RepairDesk<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, config: ServiceConfig) -> Self {
        let deps = Arc::new(Deps::new(Arc::new(store), clock, config));
        Self {
            identities: IdentityService::new(Arc::clone(&deps)),
            registry: RegistryService::new(Arc::clone(&deps)),
            cases: CaseService::new(Arc::clone(&deps)),
            shipments: ShipmentService::new(Arc::clone(&deps)),
            portal: PortalService::new(Arc::clone(&deps)),
            stats: StatsService::new(Arc::clone(&deps)),
            audit: AuditService::new(Arc::clone(&deps)),
            deps,
        }
    }

    pub fn authorizer(&self) -> &Authorizer<S> {
        &self.deps.authorizer
    }

    pub fn store(&self) -> &S {
        &self.deps.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.deps.config
    }
}
