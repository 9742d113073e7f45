use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{error::Result, utils::now_utc};

/// One completed quiz.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct StudentProgress {
    pub id: i64,
    pub student_id: i64,
    pub quiz_id: i64,
    /// No range is enforced.
    pub score: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewProgress {
    pub student_id: i64,
    pub quiz_id: i64,
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ProgressUpdate {
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

/// A row of [`ProgressReport::recent`], joined with quiz and lesson names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct ProgressEntry {
    pub quiz_id: i64,
    pub quiz_title: String,
    pub lesson_topic: String,
    pub score: Option<f64>,
    #[serde(with = "time::serde::rfc3339")]
    pub completed_at: OffsetDateTime,
}

/// Aggregate view of a student's quiz history; this is what the tutor sees as `progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressReport {
    pub student_id: i64,
    pub quizzes_completed: i64,
    pub average_score: Option<f64>,
    pub best_score: Option<f64>,
    pub recent: Vec<ProgressEntry>,
}

const PROGRESS_COLUMNS: &str = "id, student_id, quiz_id, score, completed_at, feedback";
const RECENT_LIMIT: i64 = 5;

pub async fn record_progress(
    database: &SqlitePool,
    progress: NewProgress,
) -> Result<StudentProgress> {
    let progress = sqlx::query_as::<_, StudentProgress>(&format!(
        "INSERT INTO student_progress (student_id, quiz_id, score, completed_at, feedback) \
         VALUES (?, ?, ?, ?, ?) RETURNING {PROGRESS_COLUMNS}"
    ))
    .bind(progress.student_id)
    .bind(progress.quiz_id)
    .bind(progress.score)
    .bind(now_utc())
    .bind(progress.feedback)
    .fetch_one(database)
    .await?;
    info!(
        "student {} completed quiz {} (score {:?})",
        progress.student_id, progress.quiz_id, progress.score
    );
    Ok(progress)
}

pub async fn get_progress_record(
    database: &SqlitePool,
    id: i64,
) -> Result<Option<StudentProgress>> {
    let progress = sqlx::query_as::<_, StudentProgress>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM student_progress WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(progress)
}

pub async fn list_progress_for_student(
    database: &SqlitePool,
    student_id: i64,
) -> Result<Vec<StudentProgress>> {
    let records = sqlx::query_as::<_, StudentProgress>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM student_progress WHERE student_id = ? \
         ORDER BY completed_at, id"
    ))
    .bind(student_id)
    .fetch_all(database)
    .await?;
    Ok(records)
}

pub async fn list_progress_for_quiz(
    database: &SqlitePool,
    quiz_id: i64,
) -> Result<Vec<StudentProgress>> {
    let records = sqlx::query_as::<_, StudentProgress>(&format!(
        "SELECT {PROGRESS_COLUMNS} FROM student_progress WHERE quiz_id = ? \
         ORDER BY completed_at, id"
    ))
    .bind(quiz_id)
    .fetch_all(database)
    .await?;
    Ok(records)
}

pub async fn update_progress(
    database: &SqlitePool,
    id: i64,
    update: ProgressUpdate,
) -> Result<Option<StudentProgress>> {
    let progress = sqlx::query_as::<_, StudentProgress>(&format!(
        "UPDATE student_progress SET score = COALESCE(?, score), feedback = COALESCE(?, feedback) \
         WHERE id = ? RETURNING {PROGRESS_COLUMNS}"
    ))
    .bind(update.score)
    .bind(update.feedback)
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(progress)
}

pub async fn delete_progress(database: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM student_progress WHERE id = ?")
        .bind(id)
        .execute(database)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn summarize_for_student(
    database: &SqlitePool,
    student_id: i64,
) -> Result<ProgressReport> {
    let (quizzes_completed, average_score, best_score): (i64, Option<f64>, Option<f64>) =
        sqlx::query_as(
            "SELECT count(*), avg(score), max(score) FROM student_progress WHERE student_id = ?",
        )
        .bind(student_id)
        .fetch_one(database)
        .await?;
    let recent = sqlx::query_as::<_, ProgressEntry>(
        "SELECT p.quiz_id, q.title AS quiz_title, l.topic AS lesson_topic, p.score, p.completed_at \
         FROM student_progress p \
         JOIN quiz q ON q.id = p.quiz_id \
         JOIN lesson l ON l.id = q.lesson_id \
         WHERE p.student_id = ? \
         ORDER BY p.completed_at DESC, p.id DESC LIMIT ?",
    )
    .bind(student_id)
    .bind(RECENT_LIMIT)
    .fetch_all(database)
    .await?;
    Ok(ProgressReport {
        student_id,
        quizzes_completed,
        average_score,
        best_score,
        recent,
    })
}
