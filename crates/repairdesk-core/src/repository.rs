//! Repository trait definitions for data access abstraction.
//!
//! All repository operations are async. Compound writes (a case with its
//! first round, a status event with its round update, a full grant
//! replacement, an identity with its customer profile) are atomic: readers
//! never observe a partially applied state.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::RepairResult;
use crate::models::{
    DateRange,
    audit::{AuditLogEntry, AuditLogFilter, CreateAuditLogEntry},
    capability::{Capability, PermissionGrant},
    customer::{Customer, UpdateCustomer},
    device::{CreateDevice, Device, DeviceFilter, UpdateDevice},
    identity::{CreateIdentity, Identity, IdentityFilter, UpdateIdentity},
    round::{CreateRound, RoundSnapshot, ServiceRound, TransitionStatus, UpdateRound},
    service_case::{CaseFilter, CreateServiceCase, ServiceCase, UpdateServiceCase},
    shipment::{CreateShipment, Shipment, ShipmentFilter, UpdateShipment},
    status_event::{OperatorActivity, StatusEvent},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl<T> PaginatedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }
}

// ---------------------------------------------------------------------------
// Identities, permissions and the customer/device registry
// ---------------------------------------------------------------------------

pub trait IdentityRepository: Send + Sync {
    /// Create an identity. A `CUSTOMER` identity gets its linked customer
    /// profile in the same transaction.
    fn create(&self, input: CreateIdentity) -> impl Future<Output = RepairResult<Identity>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RepairResult<Identity>> + Send;
    fn get_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = RepairResult<Identity>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateIdentity,
    ) -> impl Future<Output = RepairResult<Identity>> + Send;
    /// Soft-delete: sets status to Disabled.
    fn disable(&self, id: Uuid) -> impl Future<Output = RepairResult<Identity>> + Send;
    /// Newest first.
    fn list(
        &self,
        filter: IdentityFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RepairResult<PaginatedResult<Identity>>> + Send;
    fn count(&self, filter: IdentityFilter) -> impl Future<Output = RepairResult<u64>> + Send;
    /// Every matching identity, ordered by username.
    fn list_all(
        &self,
        filter: IdentityFilter,
    ) -> impl Future<Output = RepairResult<Vec<Identity>>> + Send;
}

/// The permission store: capability grants held by staff identities.
pub trait PermissionRepository: Send + Sync {
    /// Atomically replace every grant of `staff_id` with `capabilities`.
    fn replace_grants(
        &self,
        staff_id: Uuid,
        capabilities: Vec<Capability>,
        granted_by: Uuid,
        granted_at: DateTime<Utc>,
    ) -> impl Future<Output = RepairResult<Vec<PermissionGrant>>> + Send;

    fn list_grants(
        &self,
        staff_id: Uuid,
    ) -> impl Future<Output = RepairResult<Vec<PermissionGrant>>> + Send;
}

pub trait CustomerRepository: Send + Sync {
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RepairResult<Customer>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateCustomer,
    ) -> impl Future<Output = RepairResult<Customer>> + Send;
    /// Newest first; `search` matches name, phone or email.
    fn list(
        &self,
        search: Option<String>,
        pagination: Pagination,
    ) -> impl Future<Output = RepairResult<PaginatedResult<Customer>>> + Send;
    fn count(&self) -> impl Future<Output = RepairResult<u64>> + Send;
}

pub trait DeviceRepository: Send + Sync {
    fn create(&self, input: CreateDevice) -> impl Future<Output = RepairResult<Device>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RepairResult<Device>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateDevice,
    ) -> impl Future<Output = RepairResult<Device>> + Send;
    /// Newest first.
    fn list(
        &self,
        filter: DeviceFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RepairResult<PaginatedResult<Device>>> + Send;
    /// Every device of one customer, newest first.
    fn list_for_customer(
        &self,
        customer_id: Uuid,
    ) -> impl Future<Output = RepairResult<Vec<Device>>> + Send;
}

// ---------------------------------------------------------------------------
// Case lifecycle
// ---------------------------------------------------------------------------

pub trait ServiceCaseRepository: Send + Sync {
    /// Create a case and its first `PENDING` round in one transaction.
    ///
    /// The case number is derived from the UTC day of `opened_at` and the
    /// number of cases already opened that day. A creation racing another
    /// one for the same number fails with [`RepairError::Conflict`] and may
    /// be retried.
    ///
    /// [`RepairError::Conflict`]: crate::error::RepairError::Conflict
    fn create_with_first_round(
        &self,
        input: CreateServiceCase,
    ) -> impl Future<Output = RepairResult<(ServiceCase, ServiceRound)>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RepairResult<ServiceCase>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateServiceCase,
        at: DateTime<Utc>,
    ) -> impl Future<Output = RepairResult<ServiceCase>> + Send;
    /// Stamp `closed_at` unless already set.
    fn close(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> impl Future<Output = RepairResult<ServiceCase>> + Send;
    /// Newest first.
    fn list(
        &self,
        filter: CaseFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RepairResult<PaginatedResult<ServiceCase>>> + Send;
    /// Newest first.
    fn list_for_device(
        &self,
        device_id: Uuid,
    ) -> impl Future<Output = RepairResult<Vec<ServiceCase>>> + Send;
    fn latest_for_device(
        &self,
        device_id: Uuid,
    ) -> impl Future<Output = RepairResult<Option<ServiceCase>>> + Send;
    fn count(&self, created: DateRange) -> impl Future<Output = RepairResult<u64>> + Send;
    /// Cases without a closure timestamp.
    fn count_open(&self) -> impl Future<Output = RepairResult<u64>> + Send;
}

pub trait ServiceRoundRepository: Send + Sync {
    /// Open a follow-up round. Fails with a conflict if the case already has
    /// a round with the same number.
    fn create(&self, input: CreateRound) -> impl Future<Output = RepairResult<ServiceRound>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RepairResult<ServiceRound>> + Send;
    /// Most recently started first.
    fn list_for_case(
        &self,
        case_id: Uuid,
    ) -> impl Future<Output = RepairResult<Vec<ServiceRound>>> + Send;
    fn latest_for_case(
        &self,
        case_id: Uuid,
    ) -> impl Future<Output = RepairResult<Option<ServiceRound>>> + Send;
    fn update_details(
        &self,
        id: Uuid,
        input: UpdateRound,
        at: DateTime<Utc>,
    ) -> impl Future<Output = RepairResult<ServiceRound>> + Send;
    /// Append a status event and move the round to its target status in
    /// one transaction.
    fn transition_status(
        &self,
        input: TransitionStatus,
    ) -> impl Future<Output = RepairResult<(StatusEvent, ServiceRound)>> + Send;
    /// Newest first.
    fn list_events(
        &self,
        round_id: Uuid,
    ) -> impl Future<Output = RepairResult<Vec<StatusEvent>>> + Send;
    fn latest_event(
        &self,
        round_id: Uuid,
    ) -> impl Future<Output = RepairResult<Option<StatusEvent>>> + Send;
    /// Rounds of cases created within `created`, most recently started
    /// first.
    fn list_snapshots(
        &self,
        created: DateRange,
    ) -> impl Future<Output = RepairResult<Vec<RoundSnapshot>>> + Send;
    /// Status events per operator, restricted to events inside `range`.
    fn count_events_by_operator(
        &self,
        range: DateRange,
    ) -> impl Future<Output = RepairResult<Vec<OperatorActivity>>> + Send;
}

pub trait ShipmentRepository: Send + Sync {
    fn create(&self, input: CreateShipment)
    -> impl Future<Output = RepairResult<Shipment>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = RepairResult<Shipment>> + Send;
    /// Apply `input`; `shipped_at` and `actual_arrival` are only stamped
    /// while unset.
    fn update(
        &self,
        id: Uuid,
        input: UpdateShipment,
        at: DateTime<Utc>,
    ) -> impl Future<Output = RepairResult<Shipment>> + Send;
    /// Newest first.
    fn list(
        &self,
        filter: ShipmentFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RepairResult<PaginatedResult<Shipment>>> + Send;
    /// Newest first.
    fn list_for_round(
        &self,
        round_id: Uuid,
    ) -> impl Future<Output = RepairResult<Vec<Shipment>>> + Send;
    fn latest_for_round(
        &self,
        round_id: Uuid,
    ) -> impl Future<Output = RepairResult<Option<Shipment>>> + Send;
}

// ---------------------------------------------------------------------------
// Audit Log (append-only)
// ---------------------------------------------------------------------------

/// Distinct values present in the audit log for a filter.
#[derive(Debug, Clone, Default)]
pub struct AuditFacets {
    pub actions: Vec<String>,
    pub resource_types: Vec<String>,
}

pub trait AuditLogRepository: Send + Sync {
    /// Append an immutable audit log entry.
    fn append(
        &self,
        input: CreateAuditLogEntry,
    ) -> impl Future<Output = RepairResult<AuditLogEntry>> + Send;
    /// Newest first.
    fn list(
        &self,
        filter: AuditLogFilter,
        pagination: Pagination,
    ) -> impl Future<Output = RepairResult<PaginatedResult<AuditLogEntry>>> + Send;
    fn facets(
        &self,
        filter: AuditLogFilter,
    ) -> impl Future<Output = RepairResult<AuditFacets>> + Send;
}

// ---------------------------------------------------------------------------
// Store bundle
// ---------------------------------------------------------------------------

/// One handle over every repository of a backing store.
///
/// Services are generic over a single `RepairStore` rather than over each
/// repository separately.
pub trait RepairStore: Send + Sync + 'static {
    type Identities: IdentityRepository;
    type Permissions: PermissionRepository;
    type Customers: CustomerRepository;
    type Devices: DeviceRepository;
    type Cases: ServiceCaseRepository;
    type Rounds: ServiceRoundRepository;
    type Shipments: ShipmentRepository;
    type AuditLog: AuditLogRepository;

    fn identities(&self) -> &Self::Identities;
    fn permissions(&self) -> &Self::Permissions;
    fn customers(&self) -> &Self::Customers;
    fn devices(&self) -> &Self::Devices;
    fn cases(&self) -> &Self::Cases;
    fn rounds(&self) -> &Self::Rounds;
    fn shipments(&self) -> &Self::Shipments;
    fn audit_log(&self) -> &Self::AuditLog;
}
