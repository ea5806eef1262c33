//! Database module for SQLite persistence.
//!
//! SQLite is the source of truth for all application data.

mod repository;

pub use repository::*;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

/// Initialize the database connection pool and run migrations.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    // Ensure the parent directory exists
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent).await.ok();
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(std::time::Duration::from_secs(30));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS donors (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL UNIQUE,
            blood_type TEXT NOT NULL,
            age INTEGER NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            zipcode TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            formatted_address TEXT,
            last_donation TEXT,
            emergency_available INTEGER NOT NULL DEFAULT 0,
            is_available INTEGER NOT NULL DEFAULT 1,
            medical_conditions TEXT,
            donation_history TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS hospitals (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            zipcode TEXT NOT NULL,
            phone TEXT NOT NULL,
            email TEXT NOT NULL,
            website TEXT,
            latitude REAL NOT NULL,
            longitude REAL NOT NULL,
            formatted_address TEXT,
            blood_inventory TEXT,
            emergency_available INTEGER NOT NULL DEFAULT 1,
            verified INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS blood_requests (
            id TEXT PRIMARY KEY,
            request_type TEXT NOT NULL,
            requested_by TEXT NOT NULL,
            hospital_id TEXT,
            hospital_name TEXT,
            patient_name TEXT,
            blood_type TEXT NOT NULL,
            units_needed INTEGER NOT NULL,
            units_received INTEGER NOT NULL DEFAULT 0,
            urgency TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            zipcode TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            formatted_address TEXT,
            contact_name TEXT NOT NULL,
            contact_number TEXT NOT NULL,
            additional_info TEXT,
            notes TEXT NOT NULL DEFAULT '',
            required_by TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            expires_at TEXT NOT NULL,
            closed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS request_responses (
            request_id TEXT NOT NULL REFERENCES blood_requests(id) ON DELETE CASCADE,
            donor_id TEXT NOT NULL,
            status TEXT NOT NULL,
            notified_at TEXT NOT NULL,
            responded_at TEXT,
            PRIMARY KEY (request_id, donor_id)
        );
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            related_to TEXT,
            on_model TEXT,
            priority TEXT NOT NULL DEFAULT 'medium',
            read INTEGER NOT NULL DEFAULT 0,
            read_at TEXT,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for common queries
    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_donors_match ON donors(blood_type, is_active, latitude, longitude);
        CREATE INDEX IF NOT EXISTS idx_hospitals_location ON hospitals(latitude, longitude);
        CREATE INDEX IF NOT EXISTS idx_requests_status ON blood_requests(status);
        CREATE INDEX IF NOT EXISTS idx_requests_created_at ON blood_requests(created_at);
        CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, created_at);
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
