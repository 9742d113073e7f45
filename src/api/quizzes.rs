use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use super::{AppState, auth::CurrentUser, lessons::visible_lesson};
use crate::{
    auth::Identity,
    error::{Error, Result},
    progress::list_progress_for_quiz,
    quiz::{self, NewQuiz, Quiz, QuizUpdate},
    tutor::refresh_progress,
};

/// The quiz, if it exists and its lesson is visible to the caller.
pub(super) async fn visible_quiz(
    database: &SqlitePool,
    current: &CurrentUser,
    id: i64,
) -> Result<Quiz> {
    let quiz = quiz::get_quiz(database, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("quiz {id}")))?;
    visible_lesson(database, current, quiz.lesson_id).await?;
    Ok(quiz)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct QuizForm {
    pub form_url: String,
    pub title: String,
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}/quizzes",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Quizzes of the lesson", body = Vec<Quiz>),
        (status = 403, description = "Someone else's lesson"),
        (status = 404, description = "No such lesson")
    )
)]
pub async fn list_lesson_quizzes(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Quiz>>> {
    let lesson = visible_lesson(&state.database, &current, id).await?;
    Ok(Json(quiz::list_quizzes(&state.database, lesson.id).await?))
}

#[utoipa::path(
    post,
    path = "/api/lessons/{id}/quizzes",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = QuizForm,
    responses(
        (status = 201, description = "Quiz created", body = Quiz),
        (status = 403, description = "Instructor role required"),
        (status = 404, description = "No such lesson")
    )
)]
pub async fn create_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(form): Json<QuizForm>,
) -> Result<(StatusCode, Json<Quiz>)> {
    current.require_instructor()?;
    let lesson = visible_lesson(&state.database, &current, id).await?;
    let quiz = quiz::create_quiz(
        &state.database,
        NewQuiz {
            lesson_id: lesson.id,
            form_url: form.form_url,
            title: form.title,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(quiz)))
}

#[utoipa::path(
    get,
    path = "/api/quizzes/{id}",
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 200, description = "Quiz", body = Quiz),
        (status = 403, description = "Quiz of someone else's lesson"),
        (status = 404, description = "No such quiz")
    )
)]
pub async fn get_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Quiz>> {
    Ok(Json(visible_quiz(&state.database, &current, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/quizzes/{id}",
    params(("id" = i64, Path, description = "Quiz id")),
    request_body = QuizUpdate,
    responses(
        (status = 200, description = "Updated quiz", body = Quiz),
        (status = 403, description = "Instructor role required"),
        (status = 404, description = "No such quiz")
    )
)]
pub async fn update_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<QuizUpdate>,
) -> Result<Json<Quiz>> {
    current.require_instructor()?;
    quiz::update_quiz(&state.database, id, update)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("quiz {id}")))
}

#[utoipa::path(
    delete,
    path = "/api/quizzes/{id}",
    params(("id" = i64, Path, description = "Quiz id")),
    responses(
        (status = 204, description = "Quiz and its progress records deleted"),
        (status = 403, description = "Instructor role required"),
        (status = 404, description = "No such quiz")
    )
)]
pub async fn delete_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    current.require_instructor()?;
    let completions = list_progress_for_quiz(&state.database, id).await?;
    if !quiz::delete_quiz(&state.database, id).await? {
        return Err(Error::NotFound(format!("quiz {id}")));
    }
    let mut students: Vec<i64> = completions.iter().map(|record| record.student_id).collect();
    students.sort_unstable();
    students.dedup();
    for student_id in students {
        refresh_progress(&state.tutor_sessions, &state.database, student_id).await?;
    }
    Ok(StatusCode::NO_CONTENT)
}
