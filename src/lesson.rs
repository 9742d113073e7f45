use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{error::Result, utils::now_utc};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Lesson {
    pub id: i64,
    /// Owning student.
    pub student_id: i64,
    pub topic: String,
    pub description: Option<String>,
    pub slides_url: Option<String>,
    pub doc_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct NewLesson {
    pub student_id: i64,
    pub topic: String,
    pub description: Option<String>,
    pub slides_url: Option<String>,
    pub doc_url: Option<String>,
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LessonUpdate {
    pub topic: Option<String>,
    pub description: Option<String>,
    pub slides_url: Option<String>,
    pub doc_url: Option<String>,
}

const LESSON_COLUMNS: &str = "id, student_id, topic, description, slides_url, doc_url, created_at";

pub async fn create_lesson(database: &SqlitePool, lesson: NewLesson) -> Result<Lesson> {
    let lesson = sqlx::query_as::<_, Lesson>(&format!(
        "INSERT INTO lesson (student_id, topic, description, slides_url, doc_url, created_at) \
         VALUES (?, ?, ?, ?, ?, ?) RETURNING {LESSON_COLUMNS}"
    ))
    .bind(lesson.student_id)
    .bind(lesson.topic)
    .bind(lesson.description)
    .bind(lesson.slides_url)
    .bind(lesson.doc_url)
    .bind(now_utc())
    .fetch_one(database)
    .await?;
    info!("created lesson {} for student {}", lesson.id, lesson.student_id);
    Ok(lesson)
}

pub async fn get_lesson(database: &SqlitePool, id: i64) -> Result<Option<Lesson>> {
    let lesson = sqlx::query_as::<_, Lesson>(&format!(
        "SELECT {LESSON_COLUMNS} FROM lesson WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(lesson)
}

/// All lessons, or only those owned by `student_id`.
pub async fn list_lessons(database: &SqlitePool, student_id: Option<i64>) -> Result<Vec<Lesson>> {
    let lessons = match student_id {
        Some(student_id) => {
            sqlx::query_as::<_, Lesson>(&format!(
                "SELECT {LESSON_COLUMNS} FROM lesson WHERE student_id = ? ORDER BY id"
            ))
            .bind(student_id)
            .fetch_all(database)
            .await?
        }
        None => {
            sqlx::query_as::<_, Lesson>(&format!("SELECT {LESSON_COLUMNS} FROM lesson ORDER BY id"))
                .fetch_all(database)
                .await?
        }
    };
    Ok(lessons)
}

pub async fn update_lesson(
    database: &SqlitePool,
    id: i64,
    update: LessonUpdate,
) -> Result<Option<Lesson>> {
    let lesson = sqlx::query_as::<_, Lesson>(&format!(
        "UPDATE lesson SET topic = COALESCE(?, topic), description = COALESCE(?, description), \
         slides_url = COALESCE(?, slides_url), doc_url = COALESCE(?, doc_url) \
         WHERE id = ? RETURNING {LESSON_COLUMNS}"
    ))
    .bind(update.topic)
    .bind(update.description)
    .bind(update.slides_url)
    .bind(update.doc_url)
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(lesson)
}

/// Deletes the lesson; its quizzes (and their progress rows) go with it.
pub async fn delete_lesson(database: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM lesson WHERE id = ?")
        .bind(id)
        .execute(database)
        .await?;
    if result.rows_affected() > 0 {
        info!("deleted lesson {}", id);
    }
    Ok(result.rows_affected() > 0)
}
