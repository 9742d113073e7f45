use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::info;
use utoipa::{IntoParams, ToSchema};

use super::{AppState, auth::CurrentUser};
use crate::{
    auth::Identity,
    error::{Error, Result},
    progress::{ProgressReport, summarize_for_student},
    user::{self, Role, User},
};

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub role: Option<Role>,
}

#[utoipa::path(
    get,
    path = "/api/users",
    params(UserFilter),
    responses(
        (status = 200, description = "Users ordered by id", body = Vec<User>),
        (status = 403, description = "Instructor role required")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(filter): Query<UserFilter>,
) -> Result<Json<Vec<User>>> {
    current.require_instructor()?;
    Ok(Json(user::list_users(&state.database, filter.role).await?))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}/progress",
    params(("id" = i64, Path, description = "Student id")),
    responses(
        (status = 200, description = "Progress summary", body = ProgressReport),
        (status = 403, description = "Not this student and not an instructor"),
        (status = 404, description = "No such user")
    )
)]
pub async fn student_progress(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
) -> Result<Json<ProgressReport>> {
    if !current.can_access_student(id) {
        return Err(Error::Forbidden("not your progress".to_string()));
    }
    if user::get_user(&state.database, id).await?.is_none() {
        return Err(Error::NotFound(format!("user {id}")));
    }
    Ok(Json(summarize_for_student(&state.database, id).await?))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleChange {
    pub role: Role,
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    params(("id" = i64, Path, description = "User id")),
    request_body = RoleChange,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 403, description = "Admin role required"),
        (status = 404, description = "No such user")
    )
)]
pub async fn set_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<i64>,
    Json(change): Json<RoleChange>,
) -> Result<Json<User>> {
    current.require_admin()?;
    let updated = user::update_user(&state.database, id, None, Some(change.role))
        .await?
        .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
    info!("admin {} set role of user {} to {}", current.user_id(), id, change.role);
    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::api::test_support::{json, login, send, test_app, user};

    #[tokio::test]
    async fn students_cannot_list_users() {
        let (app, state) = test_app().await;
        let sam = user(&state, "sam", Role::Student).await;
        let cookie = login(&app, sam.id).await;
        let response = send(&app, "GET", "/api/users", Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn teachers_filter_users_by_role() {
        let (app, state) = test_app().await;
        let ada = user(&state, "ada", Role::Teacher).await;
        user(&state, "sam", Role::Student).await;
        user(&state, "kim", Role::Student).await;
        let cookie = login(&app, ada.id).await;

        let response = send(&app, "GET", "/api/users", Some(&cookie), None).await;
        assert_eq!(json(response).await.as_array().unwrap().len(), 3);
        let response = send(&app, "GET", "/api/users?role=student", Some(&cookie), None).await;
        let body = json(response).await;
        let names: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["username"].clone())
            .collect();
        assert_eq!(names, [json!("sam"), json!("kim")]);
    }

    #[tokio::test]
    async fn progress_is_private_to_student_and_instructors() {
        let (app, state) = test_app().await;
        let sam = user(&state, "sam", Role::Student).await;
        let kim = user(&state, "kim", Role::Student).await;
        let ada = user(&state, "ada", Role::Teacher).await;

        let uri = format!("/api/users/{}/progress", sam.id);
        let cookie = login(&app, sam.id).await;
        let response = send(&app, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["quizzes_completed"], 0);

        let cookie = login(&app, kim.id).await;
        let response = send(&app, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let cookie = login(&app, ada.id).await;
        let response = send(&app, "GET", &uri, Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = send(&app, "GET", "/api/users/999/progress", Some(&cookie), None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn only_admins_change_roles() {
        let (app, state) = test_app().await;
        let sam = user(&state, "sam", Role::Student).await;
        let ada = user(&state, "ada", Role::Teacher).await;
        let root = user(&state, "root", Role::Admin).await;
        let uri = format!("/api/users/{}/role", sam.id);
        let body = json!({ "role": "teacher" });

        let cookie = login(&app, ada.id).await;
        let response = send(&app, "PUT", &uri, Some(&cookie), Some(body.clone())).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let cookie = login(&app, root.id).await;
        let response = send(&app, "PUT", &uri, Some(&cookie), Some(body.clone())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["role"], "teacher");

        let response = send(&app, "PUT", "/api/users/999/role", Some(&cookie), Some(body)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
