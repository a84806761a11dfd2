//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn migrated() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    repairdesk_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = migrated().await;

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "identity",
        "staff_permission",
        "customer",
        "device",
        "audit_log",
        "service_case",
        "service_round",
        "status_event",
        "shipment",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    repairdesk_db::run_migrations(&db).await.unwrap();
    repairdesk_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), repairdesk_db::latest_version() as usize);
}

#[tokio::test]
async fn round_status_is_constrained() {
    let db = migrated().await;

    let result = db
        .query(
            "CREATE service_round SET case_id = 'c', round_no = 1, \
             issue = 'screen', status = 'SHIPPED', \
             started_at = time::now(), updated_at = time::now()",
        )
        .await
        .unwrap()
        .check();

    assert!(result.is_err(), "unknown status should be rejected");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_case_numbers() {
    let db = migrated().await;

    let create = "CREATE service_case SET device_id = 'd', \
                  case_number = 'CS20240115001', day_key = '20240115', \
                  title = 'Cracked screen', created_at = time::now(), \
                  updated_at = time::now()";

    db.query(create).await.unwrap().check().unwrap();
    let result = db.query(create).await.unwrap().check();

    assert!(result.is_err(), "duplicate case number should be rejected");
}

#[tokio::test]
async fn unique_index_prevents_duplicate_round_numbers() {
    let db = migrated().await;

    let create = "CREATE service_round SET case_id = 'c', round_no = 2, \
                  issue = 'again', status = 'PENDING', \
                  started_at = time::now(), updated_at = time::now()";

    db.query(create).await.unwrap().check().unwrap();
    let result = db.query(create).await.unwrap().check();

    assert!(result.is_err(), "duplicate round number should be rejected");
}
