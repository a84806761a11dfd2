//! Integration tests for shipment and audit log repositories using
//! in-memory SurrealDB.

use chrono::{DateTime, TimeZone, Utc};
use repairdesk_core::error::RepairError;
use repairdesk_core::models::DateRange;
use repairdesk_core::models::audit::{AuditAction, AuditLogFilter, CreateAuditLogEntry};
use repairdesk_core::models::shipment::{
    CarrierInfo, CreateShipment, ShipmentDirection, ShipmentFilter, ShipmentStatus,
    UpdateShipment,
};
use repairdesk_core::repository::{AuditLogRepository, Pagination, ShipmentRepository};
use repairdesk_db::{SurrealAuditLogRepository, SurrealShipmentRepository};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    repairdesk_db::run_migrations(&db).await.unwrap();
    db
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, 0, 0).unwrap()
}

fn outbound(round_id: Uuid, created_at: DateTime<Utc>) -> CreateShipment {
    CreateShipment {
        round_id,
        direction: ShipmentDirection::Outbound,
        carrier: CarrierInfo {
            carrier: Some("SF Express".into()),
            tracking_number: Some("SF1234567890".into()),
            ..Default::default()
        },
        operator_id: Uuid::new_v4(),
        created_at,
    }
}

fn status(status: ShipmentStatus) -> UpdateShipment {
    UpdateShipment {
        status: Some(status),
        ..Default::default()
    }
}

#[tokio::test]
async fn new_shipment_is_pending() {
    let repo = SurrealShipmentRepository::new(setup().await);
    let round_id = Uuid::new_v4();

    let shipment = repo.create(outbound(round_id, at(15, 9))).await.unwrap();

    assert_eq!(shipment.status, ShipmentStatus::Pending);
    assert_eq!(shipment.round_id, round_id);
    assert_eq!(shipment.tracking_number.as_deref(), Some("SF1234567890"));
    assert!(shipment.shipped_at.is_none());
    assert!(shipment.actual_arrival.is_none());
}

#[tokio::test]
async fn in_transit_stamps_shipped_at_once() {
    let repo = SurrealShipmentRepository::new(setup().await);
    let shipment = repo
        .create(outbound(Uuid::new_v4(), at(15, 9)))
        .await
        .unwrap();

    let first = repo
        .update(shipment.id, status(ShipmentStatus::InTransit), at(16, 9))
        .await
        .unwrap();
    let second = repo
        .update(shipment.id, status(ShipmentStatus::InTransit), at(17, 9))
        .await
        .unwrap();

    assert_eq!(first.shipped_at, Some(at(16, 9)));
    assert_eq!(second.shipped_at, Some(at(16, 9)));
    assert!(second.actual_arrival.is_none());
}

#[tokio::test]
async fn arrival_is_first_write_wins() {
    let repo = SurrealShipmentRepository::new(setup().await);
    let shipment = repo
        .create(outbound(Uuid::new_v4(), at(15, 9)))
        .await
        .unwrap();

    let explicit = repo
        .update(
            shipment.id,
            UpdateShipment {
                actual_arrival: Some(at(18, 14)),
                current_location: Some("Taipei hub".into()),
                ..Default::default()
            },
            at(19, 9),
        )
        .await
        .unwrap();
    assert_eq!(explicit.actual_arrival, Some(at(18, 14)));
    assert_eq!(explicit.status, ShipmentStatus::Pending);

    let signed = repo
        .update(shipment.id, status(ShipmentStatus::Signed), at(20, 9))
        .await
        .unwrap();
    assert_eq!(signed.status, ShipmentStatus::Signed);
    assert_eq!(signed.actual_arrival, Some(at(18, 14)));
    assert_eq!(signed.current_location.as_deref(), Some("Taipei hub"));
}

#[tokio::test]
async fn arrived_stamps_arrival_with_update_time() {
    let repo = SurrealShipmentRepository::new(setup().await);
    let shipment = repo
        .create(outbound(Uuid::new_v4(), at(15, 9)))
        .await
        .unwrap();

    let arrived = repo
        .update(shipment.id, status(ShipmentStatus::Arrived), at(18, 9))
        .await
        .unwrap();

    assert_eq!(arrived.actual_arrival, Some(at(18, 9)));
    assert!(arrived.shipped_at.is_none());
}

#[tokio::test]
async fn update_unknown_shipment_is_not_found() {
    let repo = SurrealShipmentRepository::new(setup().await);

    let err = repo
        .update(Uuid::new_v4(), status(ShipmentStatus::Arrived), at(18, 9))
        .await
        .unwrap_err();
    assert!(matches!(err, RepairError::NotFound { .. }));
}

#[tokio::test]
async fn shipments_list_newest_first_with_filters() {
    let repo = SurrealShipmentRepository::new(setup().await);
    let round_id = Uuid::new_v4();

    let mut inbound = outbound(round_id, at(15, 9));
    inbound.direction = ShipmentDirection::Inbound;
    repo.create(inbound).await.unwrap();
    let latest = repo.create(outbound(round_id, at(17, 9))).await.unwrap();

    let all = repo
        .list(ShipmentFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(all.total, 2);
    assert_eq!(all.items[0].id, latest.id);

    let inbound_only = repo
        .list(
            ShipmentFilter {
                direction: Some(ShipmentDirection::Inbound),
                status: None,
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(inbound_only.total, 1);

    let newest = repo.latest_for_round(round_id).await.unwrap().unwrap();
    assert_eq!(newest.id, latest.id);
    assert_eq!(repo.list_for_round(round_id).await.unwrap().len(), 2);
}

fn audit(actor_id: Uuid, action: AuditAction, resource_type: &str, day: u32) -> CreateAuditLogEntry {
    CreateAuditLogEntry {
        actor_id,
        action,
        resource_type: resource_type.into(),
        resource_id: Some(Uuid::new_v4().to_string()),
        details: serde_json::json!({ "note": "test" }),
        ip_address: Some("10.0.0.7".into()),
        user_agent: None,
        timestamp: at(day, 9),
    }
}

#[tokio::test]
async fn audit_entries_list_newest_first_with_facets() {
    let repo = SurrealAuditLogRepository::new(setup().await);
    let admin = Uuid::new_v4();
    let staff = Uuid::new_v4();

    repo.append(audit(admin, AuditAction::CreateUser, "identity", 15))
        .await
        .unwrap();
    repo.append(audit(staff, AuditAction::CreateCase, "service_case", 16))
        .await
        .unwrap();
    let newest = repo
        .append(audit(staff, AuditAction::UpdateStatus, "service_round", 17))
        .await
        .unwrap();
    assert_eq!(newest.action, "UPDATE_STATUS");
    assert_eq!(newest.details["note"], "test");

    let page = repo
        .list(AuditLogFilter::default(), Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.total, 3);
    assert_eq!(page.items[0].id, newest.id);

    let by_staff = AuditLogFilter {
        actor_id: Some(staff),
        ..Default::default()
    };
    let staff_page = repo.list(by_staff.clone(), Pagination::default()).await.unwrap();
    assert_eq!(staff_page.total, 2);

    let facets = repo.facets(by_staff).await.unwrap();
    assert_eq!(facets.actions, vec!["CREATE_CASE", "UPDATE_STATUS"]);
    assert_eq!(facets.resource_types, vec!["service_case", "service_round"]);

    let ranged = repo
        .list(
            AuditLogFilter {
                range: DateRange {
                    from: Some(at(16, 0)),
                    to: Some(at(16, 23)),
                },
                ..Default::default()
            },
            Pagination::default(),
        )
        .await
        .unwrap();
    assert_eq!(ranged.total, 1);
}
