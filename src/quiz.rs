use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{error::Result, utils::now_utc};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Quiz {
    pub id: i64,
    pub lesson_id: i64,
    /// External form the student fills in.
    pub form_url: String,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct NewQuiz {
    pub lesson_id: i64,
    pub form_url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct QuizUpdate {
    pub form_url: Option<String>,
    pub title: Option<String>,
}

const QUIZ_COLUMNS: &str = "id, lesson_id, form_url, title, created_at";

pub async fn create_quiz(database: &SqlitePool, quiz: NewQuiz) -> Result<Quiz> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "INSERT INTO quiz (lesson_id, form_url, title, created_at) VALUES (?, ?, ?, ?) \
         RETURNING {QUIZ_COLUMNS}"
    ))
    .bind(quiz.lesson_id)
    .bind(quiz.form_url)
    .bind(quiz.title)
    .bind(now_utc())
    .fetch_one(database)
    .await?;
    info!("created quiz {} in lesson {}", quiz.id, quiz.lesson_id);
    Ok(quiz)
}

pub async fn get_quiz(database: &SqlitePool, id: i64) -> Result<Option<Quiz>> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!("SELECT {QUIZ_COLUMNS} FROM quiz WHERE id = ?"))
        .bind(id)
        .fetch_optional(database)
        .await?;
    Ok(quiz)
}

pub async fn list_quizzes(database: &SqlitePool, lesson_id: i64) -> Result<Vec<Quiz>> {
    let quizzes = sqlx::query_as::<_, Quiz>(&format!(
        "SELECT {QUIZ_COLUMNS} FROM quiz WHERE lesson_id = ? ORDER BY id"
    ))
    .bind(lesson_id)
    .fetch_all(database)
    .await?;
    Ok(quizzes)
}

pub async fn update_quiz(
    database: &SqlitePool,
    id: i64,
    update: QuizUpdate,
) -> Result<Option<Quiz>> {
    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        "UPDATE quiz SET form_url = COALESCE(?, form_url), title = COALESCE(?, title) \
         WHERE id = ? RETURNING {QUIZ_COLUMNS}"
    ))
    .bind(update.form_url)
    .bind(update.title)
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(quiz)
}

/// Deletes the quiz together with the progress rows recorded against it.
pub async fn delete_quiz(database: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM quiz WHERE id = ?")
        .bind(id)
        .execute(database)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::open_in_memory,
        lesson::{NewLesson, create_lesson},
        progress::{NewProgress, list_progress_for_student, record_progress},
        user::{Role, create_user},
    };

    async fn lesson(database: &SqlitePool) -> (i64, i64) {
        let student = create_user(database, "sam".into(), "sam@example.com".into(), Role::Student)
            .await
            .unwrap();
        let lesson = create_lesson(
            database,
            NewLesson {
                student_id: student.id,
                topic: "Fractions".into(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        (student.id, lesson.id)
    }

    fn new_quiz(lesson_id: i64, title: &str) -> NewQuiz {
        NewQuiz {
            lesson_id,
            form_url: format!("https://forms.example/{title}"),
            title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn create_requires_existing_lesson() {
        let database = open_in_memory().await.unwrap();
        let err = create_quiz(&database, new_quiz(7, "orphan")).await.unwrap_err();
        assert!(err.is_foreign_key_violation());
    }

    #[tokio::test]
    async fn list_and_update() {
        let database = open_in_memory().await.unwrap();
        let (_, lesson_id) = lesson(&database).await;
        let first = create_quiz(&database, new_quiz(lesson_id, "one")).await.unwrap();
        create_quiz(&database, new_quiz(lesson_id, "two")).await.unwrap();
        let quizzes = list_quizzes(&database, lesson_id).await.unwrap();
        assert_eq!(
            quizzes.iter().map(|q| q.title.as_str()).collect::<Vec<_>>(),
            ["one", "two"]
        );

        let updated = update_quiz(
            &database,
            first.id,
            QuizUpdate {
                title: Some("first".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(updated.title, "first");
        assert_eq!(updated.form_url, first.form_url);
    }

    #[tokio::test]
    async fn deleting_quiz_removes_its_progress() {
        let database = open_in_memory().await.unwrap();
        let (student_id, lesson_id) = lesson(&database).await;
        let quiz = create_quiz(&database, new_quiz(lesson_id, "one")).await.unwrap();
        record_progress(
            &database,
            NewProgress {
                student_id,
                quiz_id: quiz.id,
                score: Some(8.5),
                feedback: None,
            },
        )
        .await
        .unwrap();

        assert!(delete_quiz(&database, quiz.id).await.unwrap());
        assert!(list_progress_for_student(&database, student_id).await.unwrap().is_empty());
        assert!(!delete_quiz(&database, quiz.id).await.unwrap());
    }
}
