use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use utoipa::ToSchema;

use super::{AppState, auth::CurrentUser, quizzes::visible_quiz};
use crate::{
    auth::Identity,
    error::{Error, Result},
    progress::{self, NewProgress, StudentProgress},
    tutor::refresh_progress,
};

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct Completion {
    pub score: Option<f64>,
    pub feedback: Option<String>,
}

#[utoipa::path(
    post,
    path = "/api/quizzes/{id}/progress",
    params(("id" = i64, Path, description = "Quiz id")),
    request_body = Completion,
    responses(
        (status = 201, description = "Completion recorded", body = StudentProgress),
        (status = 403, description = "Quiz of someone else's lesson"),
        (status = 404, description = "No such quiz")
    )
)]
pub async fn complete_quiz(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(completion): Json<Completion>,
) -> Result<(StatusCode, Json<StudentProgress>)> {
    let quiz = visible_quiz(&state.database, &current, id).await?;
    let record = progress::record_progress(
        &state.database,
        NewProgress {
            student_id: current.user_id(),
            quiz_id: quiz.id,
            score: completion.score,
            feedback: completion.feedback,
        },
    )
    .await?;
    refresh_progress(&state.tutor_sessions, &state.database, current.user_id()).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    get,
    path = "/api/progress",
    responses(
        (
            status = 200,
            description = "Own progress records, oldest first",
            body = Vec<StudentProgress>
        )
    )
)]
pub async fn my_progress(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<StudentProgress>>> {
    Ok(Json(
        progress::list_progress_for_student(&state.database, current.user_id()).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/progress/{id}",
    params(("id" = i64, Path, description = "Progress record id")),
    responses(
        (status = 204, description = "Record deleted"),
        (status = 403, description = "Instructor role required"),
        (status = 404, description = "No such record")
    )
)]
pub async fn delete_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    current.require_instructor()?;
    let record = progress::get_progress_record(&state.database, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("progress record {id}")))?;
    progress::delete_progress(&state.database, id).await?;
    refresh_progress(&state.tutor_sessions, &state.database, record.student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
