//! Integration tests against a live PostgreSQL database.
//!
//! Run with `DATABASE_URL` pointing at a scratch database:
//! `cargo test -- --ignored`. Each test uses its own table prefix and
//! drops its tables afterwards.

use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use user_accounts::account::errors::ERRNO_DUPLICATE_IDENTIFIER;
use user_accounts::db::{PgOptionsRepository, PgUserRepository};
use user_accounts::{
    AccountService, AccountSettings, Database, DatabaseConfig, MemoryCache, NaturalKey, OptionsType,
    Tables,
};

/// Helper to connect and create a fresh schema under `prefix`
async fn setup_test_db(prefix: &str) -> (Database, Tables) {
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://postgres@localhost/user_accounts_test".to_string());

    let config = DatabaseConfig {
        database_url,
        max_connections: 5,
        min_connections: 1,
        connection_timeout_secs: 5,
        table_prefix: prefix.to_string(),
        ..DatabaseConfig::default()
    };

    let db = Database::new(&config)
        .await
        .expect("Failed to create test database");
    let tables = Tables::new(&config.table_prefix, NaturalKey::Name);
    drop_tables(&db, &tables).await;
    db.ensure_schema(&tables)
        .await
        .expect("Failed to create schema");
    (db, tables)
}

/// Helper to remove a test schema
async fn drop_tables(db: &Database, tables: &Tables) {
    for table in [&tables.user_options, &tables.user] {
        let _ = sqlx::query(&format!("DROP TABLE IF EXISTS {table}"))
            .execute(db.pool())
            .await;
    }
}

fn setup_service(db: &Database, tables: &Tables) -> AccountService {
    AccountService::new(
        Arc::new(PgUserRepository::new(db.pool().clone(), tables.clone())),
        Arc::new(PgOptionsRepository::new(db.pool().clone(), tables.clone())),
        Arc::new(MemoryCache::new()),
        AccountSettings {
            token: "pg-test-secret".to_string(),
            ..AccountSettings::default()
        },
    )
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_pg_create_login_and_duplicate() {
    let (db, tables) = setup_test_db("ua_test_a_").await;
    let service = setup_service(&db, &tables);

    let user = service.create("alice", "pw").await.expect("Create should succeed");
    assert!(user.id > 0);

    let err = service.create("alice", "pw").await.unwrap_err();
    assert_eq!(err.errno(), ERRNO_DUPLICATE_IDENTIFIER);

    let logged_in = service.login("alice", "pw").await.expect("Login should succeed");
    assert_eq!(logged_in.id, user.id);

    let changed = service.set_password(user.id, "new").await.unwrap();
    assert!(changed.mtime >= user.mtime);
    assert!(service.verify_password(user.id, "new").await.is_ok());

    drop_tables(&db, &tables).await;
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_pg_options_merge_and_owner_mtime() {
    let (db, tables) = setup_test_db("ua_test_b_").await;
    let service = setup_service(&db, &tables);
    let user = service.create("bob", "pw").await.unwrap();

    service
        .set_options(user.id, "prefs", OptionsType::Json, &json!({"a": 1}))
        .await
        .unwrap();
    service
        .set_options(user.id, "prefs", OptionsType::Json, &json!({"b": 2}))
        .await
        .unwrap();

    let options = service.get_options(user.id, "prefs").await.unwrap();
    assert_eq!(options, Some(json!({"a": 1, "b": 2})));

    let owner = service.get(user.id, "", false).await.unwrap();
    assert!(owner.mtime >= user.mtime);

    drop_tables(&db, &tables).await;
}

#[tokio::test]
#[ignore]
#[serial]
async fn test_pg_query_pages() {
    let (db, tables) = setup_test_db("ua_test_c_").await;
    let service = setup_service(&db, &tables);
    for i in 1..=7 {
        service.create(&format!("user{i}"), "pw").await.unwrap();
    }

    let page = service
        .query(&user_accounts::account::QueryRequest {
            order_by: "asc".to_string(),
            page_index: 2,
            page_size: 3,
            counter: true,
            ..Default::default()
        })
        .await
        .unwrap();

    let counter = page.counter.unwrap();
    assert_eq!(counter.row_count, 7);
    assert_eq!(counter.page_count, 3);
    let names: Vec<&str> = page.users.iter().map(|u| u.identity.as_str()).collect();
    assert_eq!(names, vec!["user4", "user5", "user6"]);

    drop_tables(&db, &tables).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
#[serial]
async fn test_pg_concurrent_create_reports_duplicate() {
    let (db, tables) = setup_test_db("ua_test_d_").await;
    let service = setup_service(&db, &tables);

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.create("racer", "pw").await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            Ok(_) => created += 1,
            Err(e) => assert_eq!(
                e.errno(),
                ERRNO_DUPLICATE_IDENTIFIER,
                "Losing creates must report a duplicate, got: {e}"
            ),
        }
    }
    assert_eq!(created, 1, "Exactly one concurrent create should win");

    let page = service
        .query(&user_accounts::account::QueryRequest {
            counter: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.counter.unwrap().row_count, 1);

    drop_tables(&db, &tables).await;
}
