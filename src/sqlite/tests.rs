//! End-to-end helper tests against a file-backed SQLite database.

use tempfile::TempDir;

use super::*;
use crate::config::HelperConfig;
use crate::driver::{Connection, Connector, Dialect};
use crate::error::ErrorKind;
use crate::helper::DbHelper;
use crate::value::SqlValue;
use crate::{fields, Statement};

async fn setup() -> (TempDir, DbHelper<SqliteConnector>) {
    let dir = tempfile::tempdir().unwrap();
    let connector = SqliteConnector::new(dir.path().join("test.db"));
    let config = HelperConfig::default().with_dump_dir(dir.path());
    let db = DbHelper::with_connector(connector, config).await.unwrap();
    assert!(
        db.update("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, score REAL)")
            .await
    );
    (dir, db)
}

#[tokio::test]
async fn test_connection_open_memory() {
    let connector = SqliteConnector::new(":memory:");
    let mut conn = connector.connect().await.unwrap();
    assert_eq!(conn.dialect(), Dialect::Sqlite);
    assert!(!conn.is_closed());

    conn.ping(false).await.unwrap();
    conn.close().await.unwrap();
    assert!(conn.is_closed());
    assert!(conn.ping(false).await.is_err());
}

#[tokio::test]
async fn test_insert_and_get_all() {
    let (_dir, db) = setup().await;

    let outcome = db
        .try_insert("users", &fields! { "id" => 1, "name" => "Bob", "score" => 1.5 })
        .await
        .unwrap();
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.last_insert_id, Some(1));
    assert!(db.insert("users", &fields! { "id" => 2, "name" => "Al", "score" => None::<f64> }).await);

    let rows = db.get_all("SELECT id, name, score FROM users ORDER BY id", []).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["name"], SqlValue::Text("Bob".into()));
    assert_eq!(rows[0]["score"], SqlValue::Float(1.5));
    assert_eq!(rows[1]["score"], SqlValue::Null);

    let rows = db
        .get_all("SELECT name FROM users WHERE id = ?", [SqlValue::Int(2)])
        .await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], SqlValue::Text("Al".into()));
}

#[tokio::test]
async fn test_quotes_are_bound_not_interpolated() {
    let (_dir, db) = setup().await;

    let name = "Robert'); DROP TABLE users;--";
    assert!(db.insert("users", &fields! { "id" => 1, "name" => name }).await);

    let rows = db.get_all("SELECT name FROM users", []).await;
    assert_eq!(rows[0]["name"], SqlValue::Text(name.into()));
}

#[tokio::test]
async fn test_insert_or_update() {
    let (_dir, db) = setup().await;

    assert!(db.insert_or_update("users", &fields! { "id" => 1, "name" => "Bob" }).await);
    assert!(db.insert_or_update("users", &fields! { "id" => 1, "name" => "Robert" }).await);

    let rows = db.get_all("SELECT id, name FROM users", []).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["name"], SqlValue::Text("Robert".into()));
}

#[tokio::test]
async fn test_last_insert_id_with_reused_rowid() {
    let (_dir, db) = setup().await;
    let mut conn = db.connect().await.unwrap();

    let first = conn
        .execute("INSERT INTO users(id,name) VALUES (?,?)", &[SqlValue::Int(1), SqlValue::from("Bob")])
        .await
        .unwrap();
    assert_eq!(first.last_insert_id, Some(1));

    conn.execute("DELETE FROM users WHERE id = ?", &[SqlValue::Int(1)])
        .await
        .unwrap();
    let second = conn
        .execute("INSERT INTO users(id,name) VALUES (?,?)", &[SqlValue::Int(1), SqlValue::from("Bob")])
        .await
        .unwrap();
    assert_eq!(second.rows_affected, 1);
    assert_eq!(second.last_insert_id, Some(1));

    let update = conn
        .execute(
            "INSERT INTO users(id,name) VALUES (?,?) ON CONFLICT DO UPDATE SET name=?",
            &[SqlValue::Int(1), SqlValue::from("Al"), SqlValue::from("Al")],
        )
        .await
        .unwrap();
    assert_eq!(update.rows_affected, 1);
    assert_eq!(update.last_insert_id, None);
}

#[tokio::test]
async fn test_duplicate_key_is_rejected() {
    let (_dir, db) = setup().await;

    assert!(db.insert("users", &fields! { "id" => 1, "name" => "Bob" }).await);
    assert!(!db.insert("users", &fields! { "id" => 1, "name" => "Bob" }).await);

    let err = db
        .try_insert("users", &fields! { "id" => 1, "name" => "Bob" })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rejected);
}

#[tokio::test]
async fn test_bad_query_yields_empty_rows() {
    let (_dir, db) = setup().await;

    assert!(db.get_all("SELECT nope FROM missing", []).await.is_empty());
    let err = db
        .try_get_all(&Statement::raw("SELECT nope FROM missing"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Rejected);
}

#[tokio::test]
async fn test_update_and_last_insert_id() {
    let (_dir, db) = setup().await;

    assert!(db.insert("users", &fields! { "name" => "Bob" }).await);
    let outcome = db.try_update("UPDATE users SET score = 3 WHERE name = 'Bob'").await.unwrap();
    assert_eq!(outcome.rows_affected, 1);
    assert_eq!(outcome.last_insert_id, None);

    let rows = db.get_last_insert_id().await;
    assert_eq!(rows.len(), 1);
    assert!(rows[0].contains_key("last_insert_rowid()"));
}

#[tokio::test]
async fn test_file_insert_does_not_touch_database() {
    let (dir, db) = setup().await;

    db.file_insert("users", &fields! { "id" => 9, "name" => "Zed" })
        .await
        .unwrap();

    assert!(db.get_all("SELECT id FROM users", []).await.is_empty());
    let text = std::fs::read_to_string(dir.path().join("users.sql")).unwrap();
    assert_eq!(text, "INSERT IGNORE INTO users(id,name) VALUES (9,'Zed');\n");
}
