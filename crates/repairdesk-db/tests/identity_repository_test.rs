//! Integration tests for the identity, customer and permission
//! repositories using in-memory SurrealDB.

use chrono::{TimeZone, Utc};
use repairdesk_core::error::RepairError;
use repairdesk_core::models::capability::Capability;
use repairdesk_core::models::customer::UpdateCustomer;
use repairdesk_core::models::identity::{
    CreateIdentity, IdentityFilter, IdentityStatus, Role, UpdateIdentity,
};
use repairdesk_core::repository::{
    CustomerRepository, IdentityRepository, Pagination, PermissionRepository,
};
use repairdesk_db::{
    SurrealCustomerRepository, SurrealIdentityRepository, SurrealPermissionRepository,
};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    repairdesk_db::run_migrations(&db).await.unwrap();
    db
}

fn new_identity(username: &str, role: Role) -> CreateIdentity {
    CreateIdentity {
        username: username.into(),
        password: "CorrectHorse9!".into(),
        role,
        email: Some(format!("{username}@example.com")),
        phone: None,
        customer_name: None,
        customer_address: None,
    }
}

#[tokio::test]
async fn create_and_get_identity() {
    let db = setup().await;
    let repo = SurrealIdentityRepository::new(db);

    let staff = repo.create(new_identity("kim", Role::Staff)).await.unwrap();

    assert_eq!(staff.username, "kim");
    assert_eq!(staff.role, Role::Staff);
    assert_eq!(staff.status, IdentityStatus::Active);
    assert!(staff.customer_id.is_none());
    assert!(staff.password_hash.starts_with("$argon2id$"));

    let fetched = repo.get_by_username("kim").await.unwrap();
    assert_eq!(fetched.id, staff.id);
}

#[tokio::test]
async fn customer_identity_gets_exactly_one_profile() {
    let db = setup().await;
    let identities = SurrealIdentityRepository::new(db.clone());
    let customers = SurrealCustomerRepository::new(db);

    let mut input = new_identity("ming", Role::Customer);
    input.phone = Some("0912345678".into());
    let identity = identities.create(input).await.unwrap();

    let customer_id = identity.customer_id.expect("customer profile linked");
    let customer = customers.get_by_id(customer_id).await.unwrap();
    assert_eq!(customer.name, "ming", "name defaults to the username");
    assert_eq!(customer.phone.as_deref(), Some("0912345678"));
    assert_eq!(customer.identity_id, Some(identity.id));
    assert_eq!(customers.count().await.unwrap(), 1);
}

#[tokio::test]
async fn duplicate_username_is_rejected_without_partial_profile() {
    let db = setup().await;
    let identities = SurrealIdentityRepository::new(db.clone());
    let customers = SurrealCustomerRepository::new(db);

    identities
        .create(new_identity("ming", Role::Customer))
        .await
        .unwrap();
    let err = identities
        .create(new_identity("ming", Role::Customer))
        .await
        .unwrap_err();

    assert!(matches!(err, RepairError::AlreadyExists { .. }));
    assert_eq!(customers.count().await.unwrap(), 1);
}

#[tokio::test]
async fn update_sets_and_clears_nullable_fields() {
    let db = setup().await;
    let repo = SurrealIdentityRepository::new(db);
    let identity = repo.create(new_identity("kim", Role::Staff)).await.unwrap();

    let updated = repo
        .update(
            identity.id,
            UpdateIdentity {
                email: Some(None),
                phone: Some(Some("0200".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(updated.email.is_none());
    assert_eq!(updated.phone.as_deref(), Some("0200"));
    assert_eq!(updated.password_hash, identity.password_hash);

    let rehashed = repo
        .update(
            identity.id,
            UpdateIdentity {
                password: Some("AnotherSecret1!".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_ne!(rehashed.password_hash, identity.password_hash);
}

#[tokio::test]
async fn disabled_identity_stays_queryable() {
    let db = setup().await;
    let repo = SurrealIdentityRepository::new(db);
    let identity = repo.create(new_identity("kim", Role::Staff)).await.unwrap();

    repo.disable(identity.id).await.unwrap();

    let fetched = repo.get_by_id(identity.id).await.unwrap();
    assert_eq!(fetched.status, IdentityStatus::Disabled);

    let active_staff = repo
        .count(IdentityFilter {
            role: Some(Role::Staff),
            status: Some(IdentityStatus::Active),
        })
        .await
        .unwrap();
    assert_eq!(active_staff, 0);
}

#[tokio::test]
async fn update_unknown_identity_is_not_found() {
    let db = setup().await;
    let repo = SurrealIdentityRepository::new(db);

    let err = repo
        .update(uuid::Uuid::new_v4(), UpdateIdentity::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::NotFound { .. }));
}

#[tokio::test]
async fn list_filters_by_role() {
    let db = setup().await;
    let repo = SurrealIdentityRepository::new(db);
    repo.create(new_identity("boss", Role::Admin)).await.unwrap();
    repo.create(new_identity("kim", Role::Staff)).await.unwrap();
    repo.create(new_identity("lee", Role::Staff)).await.unwrap();

    let page = repo
        .list(
            IdentityFilter {
                role: Some(Role::Staff),
                status: None,
            },
            Pagination::default(),
        )
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert!(page.items.iter().all(|i| i.role == Role::Staff));
    assert_eq!(repo.count(IdentityFilter::default()).await.unwrap(), 3);
}

#[tokio::test]
async fn list_all_orders_by_username() {
    let db = setup().await;
    let repo = SurrealIdentityRepository::new(db);
    repo.create(new_identity("lee", Role::Staff)).await.unwrap();
    repo.create(new_identity("boss", Role::Admin)).await.unwrap();
    let kim = repo.create(new_identity("kim", Role::Staff)).await.unwrap();
    repo.disable(kim.id).await.unwrap();

    let staff = repo
        .list_all(IdentityFilter {
            role: Some(Role::Staff),
            status: None,
        })
        .await
        .unwrap();
    let names: Vec<_> = staff.iter().map(|i| i.username.as_str()).collect();
    assert_eq!(names, vec!["kim", "lee"]);

    let active_staff = repo
        .list_all(IdentityFilter {
            role: Some(Role::Staff),
            status: Some(IdentityStatus::Active),
        })
        .await
        .unwrap();
    assert_eq!(active_staff.len(), 1);
    assert_eq!(active_staff[0].username, "lee");
}

#[tokio::test]
async fn customer_search_matches_name_phone_and_email() {
    let db = setup().await;
    let identities = SurrealIdentityRepository::new(db.clone());
    let customers = SurrealCustomerRepository::new(db);

    let mut ming = new_identity("ming", Role::Customer);
    ming.customer_name = Some("Wang Ming".into());
    ming.phone = Some("0911000111".into());
    identities.create(ming).await.unwrap();
    identities
        .create(new_identity("hua", Role::Customer))
        .await
        .unwrap();

    let by_name = customers
        .list(Some("WANG".into()), Pagination::default())
        .await
        .unwrap();
    assert_eq!(by_name.total, 1);
    assert_eq!(by_name.items[0].name, "Wang Ming");

    let by_phone = customers
        .list(Some("000111".into()), Pagination::default())
        .await
        .unwrap();
    assert_eq!(by_phone.total, 1);

    let by_email = customers
        .list(Some("hua@".into()), Pagination::default())
        .await
        .unwrap();
    assert_eq!(by_email.total, 1);
}

#[tokio::test]
async fn customer_update_clears_address() {
    let db = setup().await;
    let identities = SurrealIdentityRepository::new(db.clone());
    let customers = SurrealCustomerRepository::new(db);

    let mut input = new_identity("ming", Role::Customer);
    input.customer_address = Some("12 Harbour Rd".into());
    let identity = identities.create(input).await.unwrap();
    let customer_id = identity.customer_id.unwrap();

    let updated = customers
        .update(
            customer_id,
            UpdateCustomer {
                name: Some("Ming Wang".into()),
                address: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Ming Wang");
    assert!(updated.address.is_none());
}

#[tokio::test]
async fn replace_grants_swaps_the_whole_set() {
    let db = setup().await;
    let identities = SurrealIdentityRepository::new(db.clone());
    let permissions = SurrealPermissionRepository::new(db);

    let admin = identities
        .create(new_identity("boss", Role::Admin))
        .await
        .unwrap();
    let staff = identities
        .create(new_identity("kim", Role::Staff))
        .await
        .unwrap();
    let at = Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();

    let grants = permissions
        .replace_grants(
            staff.id,
            vec![
                Capability::CaseWrite,
                Capability::CaseReadAll,
                Capability::CaseWrite,
            ],
            admin.id,
            at,
        )
        .await
        .unwrap();
    assert_eq!(grants.len(), 2, "duplicates collapse");
    assert!(grants.iter().all(|g| g.granted_by == admin.id));

    let grants = permissions
        .replace_grants(staff.id, vec![Capability::ShipmentRead], admin.id, at)
        .await
        .unwrap();
    let caps: Vec<_> = grants.iter().map(|g| g.capability).collect();
    assert_eq!(caps, vec![Capability::ShipmentRead]);

    permissions
        .replace_grants(staff.id, Vec::new(), admin.id, at)
        .await
        .unwrap();
    assert!(permissions.list_grants(staff.id).await.unwrap().is_empty());
}
