//! End-to-end behaviour of the migration runner against in-memory SQLite

use std::fs;
use std::path::Path;

use ecom_orm::{
    Database, Ledger, MigrationConfig, MigrationFailure, MigrationRunner, MigrationStatus,
    OrmError, PoolConfig, RunnerState,
};
use tempfile::TempDir;

async fn memory_db() -> Database {
    Database::connect("sqlite::memory:", &PoolConfig::single_connection())
        .await
        .expect("in-memory sqlite should open")
}

fn write_migration(dir: &Path, filename: &str, sql: &str) {
    fs::write(dir.join(filename), sql).expect("write migration file");
}

fn runner_for(db: &Database, dir: &Path) -> MigrationRunner {
    MigrationRunner::new(db.clone(), MigrationConfig::default().with_dir(dir)).unwrap()
}

async fn applied_versions(db: &Database) -> Vec<String> {
    let mut conn = db.pool().acquire().await.unwrap();
    Ledger::new("schema_migrations")
        .unwrap()
        .load_applied(&mut conn)
        .await
        .unwrap()
        .into_iter()
        .collect()
}

async fn table_exists(db: &Database, table: &str) -> bool {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
    )
    .bind(table)
    .fetch_one(db.pool())
    .await
    .unwrap();
    count > 0
}

fn init_and_add_column(dir: &Path) {
    write_migration(
        dir,
        "001_init.sql",
        "CREATE TABLE products (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );
    write_migration(
        dir,
        "002_add_col.sql",
        "ALTER TABLE products ADD COLUMN price_cents INTEGER NOT NULL DEFAULT 0;",
    );
}

#[tokio::test]
async fn test_up_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    init_and_add_column(temp_dir.path());
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());

    let first = runner.up().await.unwrap();
    assert_eq!(first.applied_count, 2);
    assert_eq!(first.applied_migrations, vec!["001_init.sql", "002_add_col.sql"]);
    assert_eq!(first.skipped_count, 0);

    let second = runner.up().await.unwrap();
    assert_eq!(second.applied_count, 0);
    assert!(second.applied_migrations.is_empty());
    assert_eq!(second.skipped_count, 2);
    assert_eq!(applied_versions(&db).await, vec!["001", "002"]);
}

#[tokio::test]
async fn test_up_applies_in_filename_order() {
    let temp_dir = TempDir::new().unwrap();
    // 002 depends on the table created by 001
    write_migration(
        temp_dir.path(),
        "002_x.sql",
        "INSERT INTO categories (name) VALUES ('toys');",
    );
    write_migration(
        temp_dir.path(),
        "001_y.sql",
        "CREATE TABLE categories (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
    );
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());

    let result = runner.up().await.unwrap();
    assert_eq!(result.applied_migrations, vec!["001_y.sql", "002_x.sql"]);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM categories")
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_failing_migration_is_atomic_and_stops_the_run() {
    let temp_dir = TempDir::new().unwrap();
    write_migration(
        temp_dir.path(),
        "001_init.sql",
        "CREATE TABLE customers (id INTEGER PRIMARY KEY);",
    );
    write_migration(
        temp_dir.path(),
        "002_broken.sql",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY);\nINSERT INTO no_such_table VALUES (1);",
    );
    write_migration(
        temp_dir.path(),
        "003_later.sql",
        "CREATE TABLE payments (id INTEGER PRIMARY KEY);",
    );
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());

    let err = runner.up().await.unwrap_err();
    assert_eq!(err.migration_file(), Some("002_broken.sql"));
    assert!(matches!(
        err,
        OrmError::Migration {
            cause: MigrationFailure::Execute(_),
            ..
        }
    ));
    assert_eq!(runner.state(), RunnerState::Failed);

    assert_eq!(applied_versions(&db).await, vec!["001"]);
    assert!(table_exists(&db, "customers").await);
    assert!(!table_exists(&db, "orders").await);
    assert!(!table_exists(&db, "payments").await);

    // Fixing the file and re-running resumes where the run stopped
    write_migration(
        temp_dir.path(),
        "002_broken.sql",
        "CREATE TABLE orders (id INTEGER PRIMARY KEY);",
    );
    let result = runner.up().await.unwrap();
    assert_eq!(result.applied_migrations, vec!["002_broken.sql", "003_later.sql"]);
    assert_eq!(runner.state(), RunnerState::Ready);
}

#[tokio::test]
async fn test_status_never_mutates() {
    let temp_dir = TempDir::new().unwrap();
    init_and_add_column(temp_dir.path());
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());

    let first = runner.status().await.unwrap();
    assert_eq!(first.len(), 2);
    assert!(first.iter().all(|entry| entry.status == MigrationStatus::Pending));

    for _ in 0..3 {
        assert_eq!(runner.status().await.unwrap(), first);
    }
    assert!(applied_versions(&db).await.is_empty());
    assert!(!table_exists(&db, "products").await);
}

#[tokio::test]
async fn test_down_forgets_only_the_latest_version() {
    let temp_dir = TempDir::new().unwrap();
    init_and_add_column(temp_dir.path());
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());

    runner.up().await.unwrap();
    assert_eq!(applied_versions(&db).await, vec!["001", "002"]);

    let forgotten = runner.down().await.unwrap().expect("a version to forget");
    assert_eq!(forgotten.filename, "002_add_col.sql");
    assert_eq!(applied_versions(&db).await, vec!["001"]);

    let status = runner.status().await.unwrap();
    let lines: Vec<String> = status.iter().map(|entry| entry.to_string()).collect();
    assert_eq!(
        lines,
        vec!["✅ 001_init.sql (applied)", "⏳ 002_add_col.sql (pending)"]
    );

    // The column added by 002 is still there: down never runs reverse SQL
    sqlx::query("INSERT INTO products (name, price_cents) VALUES ('mug', 900)")
        .execute(db.pool())
        .await
        .expect("price_cents column should remain after down");
}

#[tokio::test]
async fn test_down_on_empty_ledger_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    init_and_add_column(temp_dir.path());
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());
    assert_eq!(runner.state(), RunnerState::Uninitialized);

    assert!(runner.down().await.unwrap().is_none());
    assert_eq!(runner.state(), RunnerState::Ready);
    assert!(applied_versions(&db).await.is_empty());
}

#[tokio::test]
async fn test_duplicate_versions_fail_before_applying() {
    let temp_dir = TempDir::new().unwrap();
    write_migration(
        temp_dir.path(),
        "001_a.sql",
        "CREATE TABLE a (id INTEGER);",
    );
    write_migration(
        temp_dir.path(),
        "001_b.sql",
        "CREATE TABLE b (id INTEGER);",
    );
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());

    let err = runner.up().await.unwrap_err();
    assert!(matches!(err, OrmError::DuplicateVersion { ref version, .. } if version == "001"));
    assert!(!table_exists(&db, "a").await);
    assert!(applied_versions(&db).await.is_empty());
}

#[tokio::test]
async fn test_non_sql_entries_are_ignored() {
    let temp_dir = TempDir::new().unwrap();
    init_and_add_column(temp_dir.path());
    write_migration(temp_dir.path(), "notes.txt", "not sql at all");
    fs::create_dir(temp_dir.path().join("003_archive.sql")).unwrap();
    let db = memory_db().await;
    let mut runner = runner_for(&db, temp_dir.path());

    let result = runner.up().await.unwrap();
    assert_eq!(result.applied_count, 2);
    assert_eq!(runner.status().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_missing_directory_is_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let db = memory_db().await;
    let mut runner = runner_for(&db, &temp_dir.path().join("missing"));

    let err = runner.up().await.unwrap_err();
    assert!(matches!(err, OrmError::Io { .. }));
    assert_eq!(runner.state(), RunnerState::Failed);
}

#[tokio::test]
async fn test_custom_ledger_table() {
    let temp_dir = TempDir::new().unwrap();
    init_and_add_column(temp_dir.path());
    let db = memory_db().await;
    let config = MigrationConfig::default()
        .with_dir(temp_dir.path())
        .with_table("ecom_schema_versions");
    let mut runner = MigrationRunner::new(db.clone(), config).unwrap();

    runner.up().await.unwrap();
    assert!(table_exists(&db, "ecom_schema_versions").await);
    assert!(!table_exists(&db, "schema_migrations").await);

    let bad = MigrationConfig::default().with_table("versions; DROP TABLE products");
    assert!(matches!(
        MigrationRunner::new(db, bad),
        Err(OrmError::InvalidIdentifier { .. })
    ));
}
