//! [`RepairStore`] over a single SurrealDB handle.

use repairdesk_core::repository::RepairStore;
use surrealdb::{Connection, Surreal};

use crate::repository::{
    SurrealAuditLogRepository, SurrealCustomerRepository, SurrealDeviceRepository,
    SurrealIdentityRepository, SurrealPermissionRepository, SurrealServiceCaseRepository,
    SurrealServiceRoundRepository, SurrealShipmentRepository,
};

/// Every SurrealDB repository sharing one connection.
#[derive(Clone)]
pub struct SurrealStore<C: Connection> {
    identities: SurrealIdentityRepository<C>,
    permissions: SurrealPermissionRepository<C>,
    customers: SurrealCustomerRepository<C>,
    devices: SurrealDeviceRepository<C>,
    cases: SurrealServiceCaseRepository<C>,
    rounds: SurrealServiceRoundRepository<C>,
    shipments: SurrealShipmentRepository<C>,
    audit_log: SurrealAuditLogRepository<C>,
}

impl<C: Connection> SurrealStore<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self {
            identities: SurrealIdentityRepository::new(db.clone()),
            permissions: SurrealPermissionRepository::new(db.clone()),
            customers: SurrealCustomerRepository::new(db.clone()),
            devices: SurrealDeviceRepository::new(db.clone()),
            cases: SurrealServiceCaseRepository::new(db.clone()),
            rounds: SurrealServiceRoundRepository::new(db.clone()),
            shipments: SurrealShipmentRepository::new(db.clone()),
            audit_log: SurrealAuditLogRepository::new(db),
        }
    }
}

impl<C: Connection> RepairStore for SurrealStore<C> {
    type Identities = SurrealIdentityRepository<C>;
    type Permissions = SurrealPermissionRepository<C>;
    type Customers = SurrealCustomerRepository<C>;
    type Devices = SurrealDeviceRepository<C>;
    type Cases = SurrealServiceCaseRepository<C>;
    type Rounds = SurrealServiceRoundRepository<C>;
    type Shipments = SurrealShipmentRepository<C>;
    type AuditLog = SurrealAuditLogRepository<C>;

    fn identities(&self) -> &Self::Identities {
        &self.identities
    }

    fn permissions(&self) -> &Self::Permissions {
        &self.permissions
    }

    fn customers(&self) -> &Self::Customers {
        &self.customers
    }

    fn devices(&self) -> &Self::Devices {
        &self.devices
    }

    fn cases(&self) -> &Self::Cases {
        &self.cases
    }

    fn rounds(&self) -> &Self::Rounds {
        &self.rounds
    }

    fn shipments(&self) -> &Self::Shipments {
        &self.shipments
    }

    fn audit_log(&self) -> &Self::AuditLog {
        &self.audit_log
    }
}
