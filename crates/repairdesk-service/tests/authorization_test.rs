//! Integration tests for authorization, identity administration and
//! best-effort auditing, using in-memory SurrealDB.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};
use repairdesk_core::clock::SteppingClock;
use repairdesk_core::error::{RepairError, RepairResult};
use repairdesk_core::models::audit::{AuditLogEntry, AuditLogFilter, CreateAuditLogEntry};
use repairdesk_core::models::capability::{Capability, PermissionGrant};
use repairdesk_core::models::identity::{
    CreateIdentity, Identity, IdentityFilter, IdentityStatus, Role, UpdateIdentity,
};
use repairdesk_core::repository::{
    AuditFacets, AuditLogRepository, PaginatedResult, Pagination, PermissionRepository,
    RepairStore,
};
use repairdesk_db::{
    SurrealCustomerRepository, SurrealDeviceRepository, SurrealIdentityRepository,
    SurrealPermissionRepository, SurrealServiceCaseRepository, SurrealServiceRoundRepository,
    SurrealShipmentRepository, SurrealStore,
};
use repairdesk_service::{
    Actor, BootstrapAdmin, NewCase, Ownership, RepairDesk, RequestContext, ServiceConfig,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

async fn database() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    repairdesk_db::run_migrations(&db).await.unwrap();
    db
}

fn desk<S: RepairStore>(store: S) -> RepairDesk<S> {
    let clock = Arc::new(SteppingClock::new(start(), Duration::seconds(1)));
    RepairDesk::new(store, clock, ServiceConfig::default())
}

async fn setup() -> RepairDesk<SurrealStore<Db>> {
    desk(SurrealStore::new(database().await))
}

async fn admin_ctx<S: RepairStore>(desk: &RepairDesk<S>) -> RequestContext {
    let admin = desk
        .identities
        .ensure_admin(&BootstrapAdmin {
            username: "root".into(),
            password: "CorrectHorse9!".into(),
        })
        .await
        .unwrap()
        .expect("first bootstrap creates the admin");
    RequestContext::for_actor(Actor::from(&admin))
}

fn new_identity(username: &str, role: Role) -> CreateIdentity {
    CreateIdentity {
        username: username.into(),
        password: "CorrectHorse9!".into(),
        role,
        email: None,
        phone: None,
        customer_name: None,
        customer_address: None,
    }
}

async fn create<S: RepairStore>(
    desk: &RepairDesk<S>,
    admin: &RequestContext,
    username: &str,
    role: Role,
) -> Identity {
    desk.identities
        .create_identity(admin, new_identity(username, role))
        .await
        .unwrap()
}

async fn staff_with<S: RepairStore>(
    desk: &RepairDesk<S>,
    admin: &RequestContext,
    username: &str,
    capabilities: Vec<Capability>,
) -> Identity {
    let staff = create(desk, admin, username, Role::Staff).await;
    desk.identities
        .grant_permissions(admin, staff.id, capabilities)
        .await
        .unwrap();
    staff
}

// ---------------------------------------------------------------------------
// Authorization engine
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_is_never_denied() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;

    for cap in Capability::ALL {
        desk.authorizer()
            .authorize(&admin, &[cap], Some(Ownership::customer(Uuid::new_v4())))
            .await
            .unwrap();
    }
    desk.authorizer().authorize(&admin, &[], None).await.unwrap();
}

#[tokio::test]
async fn anonymous_callers_are_unauthenticated() {
    let desk = setup().await;
    let err = desk
        .authorizer()
        .authorize(&RequestContext::anonymous(), &[Capability::CaseWrite], None)
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::Unauthenticated));
    assert!(
        !desk
            .authorizer()
            .has_permission(&RequestContext::anonymous(), Capability::CaseWrite)
            .await
    );
}

#[tokio::test]
async fn customers_only_reach_their_own_resources() {
    let desk = setup().await;
    let own = Uuid::new_v4();
    let ctx = RequestContext::for_actor(Actor::customer(Uuid::new_v4(), own));

    desk.authorizer()
        .authorize(&ctx, &[], Some(Ownership::customer(own)))
        .await
        .unwrap();
    desk.authorizer().authorize(&ctx, &[], None).await.unwrap();

    let err = desk
        .authorizer()
        .authorize(&ctx, &[], Some(Ownership::customer(Uuid::new_v4())))
        .await
        .unwrap_err();
    match err {
        RepairError::Forbidden { reason, .. } => assert!(reason.starts_with("ACCESS_DENIED")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(
        !desk
            .authorizer()
            .has_permission(&ctx, Capability::DeviceRead)
            .await
    );
}

#[tokio::test]
async fn staff_pass_iff_grants_intersect_required() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let staff = staff_with(
        &desk,
        &admin,
        "kim",
        vec![Capability::CaseWrite, Capability::DeviceRead],
    )
    .await;
    let ctx = RequestContext::for_actor(Actor::from(&staff));

    desk.authorizer()
        .authorize(&ctx, &[Capability::CaseWrite, Capability::AuditRead], None)
        .await
        .unwrap();

    let err = desk
        .authorizer()
        .authorize(
            &ctx,
            &[Capability::AuditRead, Capability::ShipmentWrite],
            None,
        )
        .await
        .unwrap_err();
    match err {
        RepairError::Forbidden { reason, required } => {
            assert!(reason.starts_with("MISSING_PERMISSION"));
            assert_eq!(
                required,
                vec![Capability::AuditRead, Capability::ShipmentWrite]
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(
        desk.authorizer()
            .has_permission(&ctx, Capability::DeviceRead)
            .await
    );
    assert!(
        !desk
            .authorizer()
            .has_permission(&ctx, Capability::DeviceWrite)
            .await
    );
}

#[tokio::test]
async fn customers_cannot_reach_back_office_operations() {
    let desk = setup().await;
    let ctx = RequestContext::for_actor(Actor::customer(Uuid::new_v4(), Uuid::new_v4()));

    let err = desk
        .cases
        .create_case(
            &ctx,
            NewCase {
                device_id: Uuid::new_v4(),
                title: "Cracked screen".into(),
                description: None,
                issue: "screen".into(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::Forbidden { .. }));
}

/// Permission repository that counts how often grants are loaded.
struct CountingPermissions {
    inner: SurrealPermissionRepository<Db>,
    loads: Arc<AtomicUsize>,
}

impl PermissionRepository for CountingPermissions {
    async fn replace_grants(
        &self,
        staff_id: Uuid,
        capabilities: Vec<Capability>,
        granted_by: Uuid,
        granted_at: DateTime<Utc>,
    ) -> RepairResult<Vec<PermissionGrant>> {
        self.inner
            .replace_grants(staff_id, capabilities, granted_by, granted_at)
            .await
    }

    async fn list_grants(&self, staff_id: Uuid) -> RepairResult<Vec<PermissionGrant>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_grants(staff_id).await
    }
}

/// Audit log that is always down.
struct FailingAuditLog;

impl AuditLogRepository for FailingAuditLog {
    async fn append(&self, _input: CreateAuditLogEntry) -> RepairResult<AuditLogEntry> {
        Err(RepairError::Database("audit store offline".into()))
    }

    async fn list(
        &self,
        _filter: AuditLogFilter,
        _pagination: Pagination,
    ) -> RepairResult<PaginatedResult<AuditLogEntry>> {
        Err(RepairError::Database("audit store offline".into()))
    }

    async fn facets(&self, _filter: AuditLogFilter) -> RepairResult<AuditFacets> {
        Err(RepairError::Database("audit store offline".into()))
    }
}

/// SurrealDB store with instrumented permissions and a broken audit log.
struct InstrumentedStore {
    inner: SurrealStore<Db>,
    permissions: CountingPermissions,
    audit_log: FailingAuditLog,
}

impl InstrumentedStore {
    fn new(db: Surreal<Db>, loads: Arc<AtomicUsize>) -> Self {
        Self {
            inner: SurrealStore::new(db.clone()),
            permissions: CountingPermissions {
                inner: SurrealPermissionRepository::new(db),
                loads,
            },
            audit_log: FailingAuditLog,
        }
    }
}

impl RepairStore for InstrumentedStore {
    type Identities = SurrealIdentityRepository<Db>;
    type Permissions = CountingPermissions;
    type Customers = SurrealCustomerRepository<Db>;
    type Devices = SurrealDeviceRepository<Db>;
    type Cases = SurrealServiceCaseRepository<Db>;
    type Rounds = SurrealServiceRoundRepository<Db>;
    type Shipments = SurrealShipmentRepository<Db>;
    type AuditLog = FailingAuditLog;

    fn identities(&self) -> &Self::Identities {
        self.inner.identities()
    }

    fn permissions(&self) -> &Self::Permissions {
        &self.permissions
    }

    fn customers(&self) -> &Self::Customers {
        self.inner.customers()
    }

    fn devices(&self) -> &Self::Devices {
        self.inner.devices()
    }

    fn cases(&self) -> &Self::Cases {
        self.inner.cases()
    }

    fn rounds(&self) -> &Self::Rounds {
        self.inner.rounds()
    }

    fn shipments(&self) -> &Self::Shipments {
        self.inner.shipments()
    }

    fn audit_log(&self) -> &Self::AuditLog {
        &self.audit_log
    }
}

#[tokio::test]
async fn staff_capabilities_load_once_per_request() {
    let loads = Arc::new(AtomicUsize::new(0));
    let desk = desk(InstrumentedStore::new(database().await, Arc::clone(&loads)));
    let admin = admin_ctx(&desk).await;
    let staff = staff_with(&desk, &admin, "kim", vec![Capability::DeviceRead]).await;
    let baseline = loads.load(Ordering::SeqCst);

    let ctx = RequestContext::for_actor(Actor::from(&staff));
    for _ in 0..3 {
        desk.authorizer()
            .authorize(&ctx, &[Capability::DeviceRead], None)
            .await
            .unwrap();
    }
    desk.authorizer()
        .authorize(&ctx, &[Capability::CaseWrite], None)
        .await
        .unwrap_err();
    assert_eq!(loads.load(Ordering::SeqCst) - baseline, 1);

    let next_request = RequestContext::for_actor(Actor::from(&staff));
    desk.authorizer()
        .authorize(&next_request, &[Capability::DeviceRead], None)
        .await
        .unwrap();
    assert_eq!(loads.load(Ordering::SeqCst) - baseline, 2);
}

#[tokio::test]
async fn new_grants_apply_from_the_next_request() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let staff = staff_with(&desk, &admin, "kim", vec![Capability::DeviceRead]).await;

    let ongoing = RequestContext::for_actor(Actor::from(&staff));
    desk.authorizer()
        .authorize(&ongoing, &[Capability::DeviceRead], None)
        .await
        .unwrap();

    desk.identities
        .grant_permissions(&admin, staff.id, vec![Capability::AuditRead])
        .await
        .unwrap();

    // The ongoing request keeps the set it started with.
    desk.authorizer()
        .authorize(&ongoing, &[Capability::DeviceRead], None)
        .await
        .unwrap();

    let next = RequestContext::for_actor(Actor::from(&staff));
    assert!(
        desk.authorizer()
            .authorize(&next, &[Capability::DeviceRead], None)
            .await
            .is_err()
    );
    desk.authorizer()
        .authorize(&next, &[Capability::AuditRead], None)
        .await
        .unwrap();
}

#[tokio::test]
async fn failing_audit_log_never_fails_the_operation() {
    let loads = Arc::new(AtomicUsize::new(0));
    let desk = desk(InstrumentedStore::new(database().await, loads));
    let admin = admin_ctx(&desk).await;

    let staff = desk
        .identities
        .create_identity(&admin, new_identity("kim", Role::Staff))
        .await
        .unwrap();
    let grants = desk
        .identities
        .grant_permissions(&admin, staff.id, vec![Capability::CaseWrite])
        .await
        .unwrap();
    assert_eq!(grants.len(), 1);

    let disabled = desk
        .identities
        .disable_identity(&admin, staff.id)
        .await
        .unwrap();
    assert_eq!(disabled.status, IdentityStatus::Disabled);
}

// ---------------------------------------------------------------------------
// Identity administration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn only_admins_manage_identities() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let staff = staff_with(&desk, &admin, "kim", Capability::ALL.to_vec()).await;
    let ctx = RequestContext::for_actor(Actor::from(&staff));

    let err = desk
        .identities
        .create_identity(&ctx, new_identity("lee", Role::Staff))
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::Forbidden { .. }));
}

#[tokio::test]
async fn duplicate_username_is_rejected() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    create(&desk, &admin, "kim", Role::Staff).await;

    let err = desk
        .identities
        .create_identity(&admin, new_identity("kim", Role::Customer))
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::AlreadyExists { .. }));

    let lee = create(&desk, &admin, "lee", Role::Staff).await;
    let err = desk
        .identities
        .update_identity(
            &admin,
            lee.id,
            UpdateIdentity {
                username: Some("kim".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::AlreadyExists { .. }));

    // Re-submitting one's own username is not a conflict.
    desk.identities
        .update_identity(
            &admin,
            lee.id,
            UpdateIdentity {
                username: Some("lee".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn customer_identity_creates_exactly_one_profile() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;

    let mut input = new_identity("ming", Role::Customer);
    input.customer_name = Some("Wang Ming".into());
    let ming = desk
        .identities
        .create_identity(&admin, input)
        .await
        .unwrap();

    let customers = desk
        .registry
        .list_customers(&admin, None, Pagination::default())
        .await
        .unwrap();
    assert_eq!(customers.total, 1);
    assert_eq!(customers.items[0].name, "Wang Ming");
    assert_eq!(Some(customers.items[0].id), ming.customer_id);
}

#[tokio::test]
async fn admins_cannot_disable_themselves() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let admin_id = admin.actor().unwrap().id;

    let err = desk
        .identities
        .disable_identity(&admin, admin_id)
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::Validation { .. }));

    let err = desk
        .identities
        .update_identity(
            &admin,
            admin_id,
            UpdateIdentity {
                status: Some(IdentityStatus::Disabled),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::Validation { .. }));
}

#[tokio::test]
async fn disabled_identity_stays_queryable() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let kim = create(&desk, &admin, "kim", Role::Staff).await;

    desk.identities
        .disable_identity(&admin, kim.id)
        .await
        .unwrap();

    let fetched = desk.identities.get_identity(&admin, kim.id).await.unwrap();
    assert_eq!(fetched.status, IdentityStatus::Disabled);

    let disabled = desk
        .identities
        .list_identities(
            &admin,
            IdentityFilter {
                role: None,
                status: Some(IdentityStatus::Disabled),
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(disabled.total, 1);
}

#[tokio::test]
async fn grants_replace_the_whole_set_and_are_audited() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let kim = create(&desk, &admin, "kim", Role::Staff).await;

    desk.identities
        .grant_permissions(
            &admin,
            kim.id,
            vec![Capability::CaseWrite, Capability::CaseReadAll],
        )
        .await
        .unwrap();
    desk.identities
        .grant_permissions(&admin, kim.id, vec![Capability::ShipmentRead])
        .await
        .unwrap();

    let grants = desk.identities.list_permissions(&admin, kim.id).await.unwrap();
    let caps: Vec<_> = grants.iter().map(|g| g.capability).collect();
    assert_eq!(caps, vec![Capability::ShipmentRead]);

    let page = desk
        .audit
        .list_audit_logs(
            &admin,
            AuditLogFilter {
                action: Some("ASSIGN_PERMISSION".into()),
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(page.entries.total, 2);
    let latest = &page.entries.items[0];
    assert_eq!(
        latest.details["before"],
        serde_json::json!(["CASE_READ_ALL", "CASE_WRITE"])
    );
    assert_eq!(latest.details["after"], serde_json::json!(["SHIPMENT_READ"]));
}

#[tokio::test]
async fn grants_target_existing_staff_only() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let ming = create(&desk, &admin, "ming", Role::Customer).await;

    let err = desk
        .identities
        .grant_permissions(&admin, ming.id, vec![Capability::CaseWrite])
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::InvalidTarget { .. }));

    let err = desk
        .identities
        .grant_permissions(&admin, Uuid::new_v4(), vec![Capability::CaseWrite])
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::NotFound { .. }));
}

#[tokio::test]
async fn bootstrap_admin_is_created_once() {
    let desk = setup().await;
    let admin = BootstrapAdmin {
        username: "root".into(),
        password: "CorrectHorse9!".into(),
    };

    assert!(desk.identities.ensure_admin(&admin).await.unwrap().is_some());
    assert!(desk.identities.ensure_admin(&admin).await.unwrap().is_none());
}

#[tokio::test]
async fn audit_log_requires_audit_read() {
    let desk = setup().await;
    let admin = admin_ctx(&desk).await;
    let kim = staff_with(&desk, &admin, "kim", vec![Capability::CaseWrite]).await;
    let lee = staff_with(&desk, &admin, "lee", vec![Capability::AuditRead]).await;

    let err = desk
        .audit
        .list_audit_logs(
            &RequestContext::for_actor(Actor::from(&kim)),
            AuditLogFilter::default(),
            Pagination::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::Forbidden { .. }));

    let page = desk
        .audit
        .list_audit_logs(
            &RequestContext::for_actor(Actor::from(&lee)),
            AuditLogFilter::default(),
            Pagination::default(),
        )
        .await
        .unwrap();
    // Two identities created, two grant replacements.
    assert_eq!(page.entries.total, 4);
    assert_eq!(page.facets.actions, vec!["ASSIGN_PERMISSION", "CREATE_USER"]);
    assert_eq!(page.facets.resource_types, vec!["identity"]);
}
