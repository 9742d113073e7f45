//! SQLite pool and schema.
//!
//! The schema is applied on every start; each statement is idempotent.

use std::{path::Path, str::FromStr};

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

use crate::error::Result;

/// Full schema DDL.
///
/// Lesson→Quiz and Quiz→StudentProgress cascade; User deletion is restricted
/// while the user still owns lessons or progress rows.
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS user (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    username    TEXT NOT NULL,                 -- max 64
    email       TEXT NOT NULL UNIQUE,          -- max 120
    role        TEXT NOT NULL DEFAULT 'student'
                CHECK (role IN ('student', 'teacher', 'admin')),
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lesson (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id  INTEGER NOT NULL REFERENCES user(id),
    topic       TEXT NOT NULL,                 -- max 200
    description TEXT,
    slides_url  TEXT,                          -- max 500
    doc_url     TEXT,                          -- max 500
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS quiz (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    lesson_id   INTEGER NOT NULL REFERENCES lesson(id) ON DELETE CASCADE,
    form_url    TEXT NOT NULL,                 -- max 500
    title       TEXT NOT NULL,                 -- max 200
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS student_progress (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    student_id   INTEGER NOT NULL REFERENCES user(id),
    quiz_id      INTEGER NOT NULL REFERENCES quiz(id) ON DELETE CASCADE,
    score        REAL,
    completed_at TEXT NOT NULL,
    feedback     TEXT
);

CREATE INDEX IF NOT EXISTS lesson_student_idx   ON lesson(student_id);
CREATE INDEX IF NOT EXISTS quiz_lesson_idx      ON quiz(lesson_id);
CREATE INDEX IF NOT EXISTS progress_student_idx ON student_progress(student_id);
CREATE INDEX IF NOT EXISTS progress_quiz_idx    ON student_progress(quiz_id);
";

/// Open (creating if needed) the database file at `path` and apply the schema.
pub async fn open(path: impl AsRef<Path>) -> Result<SqlitePool> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!("failed to create database directory {}: {}", parent.display(), e)
        })?;
    }
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true);
    let database = SqlitePoolOptions::new().connect_with(options).await?;
    migrate(&database).await?;
    info!("database ready at {}", path.display());
    Ok(database)
}

/// Single-connection in-memory database; every connection to `:memory:` is a
/// fresh database, so the pool must never open a second one.
pub async fn open_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    let database = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;
    migrate(&database).await?;
    Ok(database)
}

pub async fn migrate(database: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(database).await?;
    Ok(())
}
