use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::IntoParams;

use super::{AppState, auth::CurrentUser};
use crate::{
    auth::Identity,
    error::{Error, Result},
    lesson::{self, Lesson, LessonUpdate, NewLesson},
    tutor::refresh_all_progress,
};

/// The lesson, if it exists and the caller owns it or teaches.
pub(super) async fn visible_lesson(
    database: &SqlitePool,
    current: &CurrentUser,
    id: i64,
) -> Result<Lesson> {
    let lesson = lesson::get_lesson(database, id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("lesson {id}")))?;
    if !current.can_access_student(lesson.student_id) {
        return Err(Error::Forbidden("not your lesson".to_string()));
    }
    Ok(lesson)
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LessonFilter {
    /// Instructors only; students always see their own lessons.
    pub student_id: Option<i64>,
}

#[utoipa::path(
    get,
    path = "/api/lessons",
    params(LessonFilter),
    responses((status = 200, description = "Lessons ordered by id", body = Vec<Lesson>))
)]
pub async fn list_lessons(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<LessonFilter>,
) -> Result<Json<Vec<Lesson>>> {
    let student_id = if current.is_instructor() {
        filter.student_id
    } else {
        Some(current.user_id())
    };
    Ok(Json(lesson::list_lessons(&state.database, student_id).await?))
}

#[utoipa::path(
    post,
    path = "/api/lessons",
    request_body = NewLesson,
    responses(
        (status = 201, description = "Lesson created", body = Lesson),
        (status = 403, description = "Instructor role required"),
        (status = 409, description = "Student does not exist")
    )
)]
pub async fn create_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(new): Json<NewLesson>,
) -> Result<(StatusCode, Json<Lesson>)> {
    current.require_instructor()?;
    let lesson = lesson::create_lesson(&state.database, new).await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

#[utoipa::path(
    get,
    path = "/api/lessons/{id}",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 200, description = "Lesson", body = Lesson),
        (status = 403, description = "Someone else's lesson"),
        (status = 404, description = "No such lesson")
    )
)]
pub async fn get_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<Lesson>> {
    Ok(Json(visible_lesson(&state.database, &current, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/lessons/{id}",
    params(("id" = i64, Path, description = "Lesson id")),
    request_body = LessonUpdate,
    responses(
        (status = 200, description = "Updated lesson", body = Lesson),
        (status = 403, description = "Instructor role required"),
        (status = 404, description = "No such lesson")
    )
)]
pub async fn update_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(update): Json<LessonUpdate>,
) -> Result<Json<Lesson>> {
    current.require_instructor()?;
    lesson::update_lesson(&state.database, id, update)
        .await?
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("lesson {id}")))
}

#[utoipa::path(
    delete,
    path = "/api/lessons/{id}",
    params(("id" = i64, Path, description = "Lesson id")),
    responses(
        (status = 204, description = "Lesson and its quizzes deleted"),
        (status = 403, description = "Instructor role required"),
        (status = 404, description = "No such lesson")
    )
)]
pub async fn delete_lesson(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    current.require_instructor()?;
    if !lesson::delete_lesson(&state.database, id).await? {
        return Err(Error::NotFound(format!("lesson {id}")));
    }
    // completions of the lesson's quizzes went with it
    refresh_all_progress(&state.tutor_sessions, &state.database).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        api::test_support::{json, login, send, test_app, user},
        user::Role,
    };

    #[tokio::test]
    async fn lesson_lifecycle() {
        let (app, state) = test_app().await;
        let sam = user(&state, "sam", Role::Student).await;
        let ada = user(&state, "ada", Role::Teacher).await;
        let teacher = login(&app, ada.id).await;

        let body = json!({
            "student_id": sam.id,
            "topic": "Fractions",
            "slides_url": "https://slides/1",
        });
        let response = send(&app, "POST", "/api/lessons", Some(&teacher), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json(response).await;
        assert_eq!(created["topic"], "Fractions");
        assert_eq!(created["description"], serde_json::Value::Null);
        let uri = format!("/api/lessons/{}", created["id"]);

        let update = json!({ "description": "Adding unlike denominators" });
        let response = send(&app, "PUT", &uri, Some(&teacher), Some(update)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = json(response).await;
        assert_eq!(updated["topic"], "Fractions");
        assert_eq!(updated["description"], "Adding unlike denominators");

        let response = send(&app, "DELETE", &uri, Some(&teacher), None).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = send(&app, "GET", &uri, Some(&teacher), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(&app, "DELETE", &uri, Some(&teacher), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lesson_for_unknown_student_conflicts() {
        let (app, state) = test_app().await;
        let ada = user(&state, "ada", Role::Teacher).await;
        let teacher = login(&app, ada.id).await;
        let body = json!({ "student_id": 999, "topic": "Ghost" });
        let response = send(&app, "POST", "/api/lessons", Some(&teacher), Some(body)).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn students_see_only_their_lessons() {
        let (app, state) = test_app().await;
        let sam = user(&state, "sam", Role::Student).await;
        let kim = user(&state, "kim", Role::Student).await;
        let ada = user(&state, "ada", Role::Teacher).await;
        let mine = lesson::create_lesson(
            &state.database,
            NewLesson { student_id: sam.id, topic: "Poetry".into(), ..Default::default() },
        )
        .await
        .unwrap();
        let theirs = lesson::create_lesson(
            &state.database,
            NewLesson { student_id: kim.id, topic: "Algebra".into(), ..Default::default() },
        )
        .await
        .unwrap();

        let student = login(&app, sam.id).await;
        let response = send(&app, "GET", "/api/lessons?student_id=0", Some(&student), None).await;
        let listed = json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], mine.id);

        let uri = format!("/api/lessons/{}", theirs.id);
        let response = send(&app, "GET", &uri, Some(&student), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = json!({ "student_id": sam.id, "topic": "Self-assigned" });
        let response = send(&app, "POST", "/api/lessons", Some(&student), Some(body)).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let teacher = login(&app, ada.id).await;
        let response = send(&app, "GET", "/api/lessons", Some(&teacher), None).await;
        assert_eq!(json(response).await.as_array().unwrap().len(), 2);
        let uri = format!("/api/lessons?student_id={}", kim.id);
        let response = send(&app, "GET", &uri, Some(&teacher), None).await;
        assert_eq!(json(response).await[0]["topic"], "Algebra");
    }
}
