pub mod auth;
pub mod lessons;
pub mod progress;
pub mod quizzes;
pub mod tutor;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sqlx::SqlitePool;
use utoipa::OpenApi;

use crate::{
    auth::GoogleOAuth,
    tutor::{AgentDescriptor, TutorSessions},
};

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub database: SqlitePool,
    pub agent: Arc<AgentDescriptor>,
    pub tutor_sessions: TutorSessions,
    /// `None` when Google credentials are not configured.
    pub oauth: Option<Arc<GoogleOAuth>>,
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Student Tutor API", description = "Lessons, quizzes, progress and tutor tools"),
    paths(
        auth::google_login,
        auth::google_callback,
        auth::logout,
        auth::me,
        users::list_users,
        users::student_progress,
        users::set_role,
        lessons::list_lessons,
        lessons::create_lesson,
        lessons::get_lesson,
        lessons::update_lesson,
        lessons::delete_lesson,
        quizzes::list_lesson_quizzes,
        quizzes::create_quiz,
        quizzes::get_quiz,
        quizzes::update_quiz,
        quizzes::delete_quiz,
        progress::complete_quiz,
        progress::my_progress,
        progress::delete_progress,
        tutor::agent,
        tutor::call_tool,
        tutor::get_state,
        tutor::reset_state,
    )
)]
pub struct ApiDoc;

/// All application routes, without state or session layer.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest(
            "/auth",
            Router::new()
                .route("/google/login", get(auth::google_login))
                .route("/google/callback", get(auth::google_callback))
                .route("/logout", post(auth::logout)),
        )
        .nest(
            "/api",
            Router::new()
                .route("/me", get(auth::me))
                .route("/users", get(users::list_users))
                .route("/users/{id}/progress", get(users::student_progress))
                .route("/users/{id}/role", put(users::set_role))
                .route(
                    "/lessons",
                    get(lessons::list_lessons).post(lessons::create_lesson),
                )
                .route(
                    "/lessons/{id}",
                    get(lessons::get_lesson)
                        .put(lessons::update_lesson)
                        .delete(lessons::delete_lesson),
                )
                .route(
                    "/lessons/{id}/quizzes",
                    get(quizzes::list_lesson_quizzes).post(quizzes::create_quiz),
                )
                .route(
                    "/quizzes/{id}",
                    get(quizzes::get_quiz)
                        .put(quizzes::update_quiz)
                        .delete(quizzes::delete_quiz),
                )
                .route("/quizzes/{id}/progress", post(progress::complete_quiz))
                .route("/progress", get(progress::my_progress))
                .route("/progress/{id}", axum::routing::delete(progress::delete_progress))
                .route("/tutor/agent", get(tutor::agent))
                .route("/tutor/tools/{name}", post(tutor::call_tool))
                .route(
                    "/tutor/state",
                    get(tutor::get_state).delete(tutor::reset_state),
                ),
        )
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::{
        Router,
        body::{Body, to_bytes},
        extract::Path,
        http::{Request, Response, header},
        routing::get,
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, Session, SessionManagerLayer};

    use super::{AppState, auth::USER_ID_KEY, routes};
    use crate::{
        config::TutorConfig,
        db::open_in_memory,
        tutor::{AgentDescriptor, new_session_cache},
        user::{Role, User, create_user},
    };

    async fn test_login(session: Session, Path(id): Path<i64>) {
        session.insert(USER_ID_KEY, id).await.unwrap();
    }

    pub async fn test_app() -> (Router, AppState) {
        let state = AppState {
            database: open_in_memory().await.unwrap(),
            agent: Arc::new(AgentDescriptor::default()),
            tutor_sessions: new_session_cache(&TutorConfig::default()),
            oauth: None,
        };
        let app = routes()
            .route("/test/login/{id}", get(test_login))
            .with_state(state.clone())
            .layer(SessionManagerLayer::new(MemoryStore::default()));
        (app, state)
    }

    pub async fn user(state: &AppState, name: &str, role: Role) -> User {
        create_user(&state.database, name.into(), format!("{name}@example.com"), role)
            .await
            .unwrap()
    }

    /// Session cookie for a logged-in `user_id`.
    pub async fn login(app: &Router, user_id: i64) -> String {
        let response = app
            .clone()
            .oneshot(
                Request::get(format!("/test/login/{user_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
        cookie.split(';').next().unwrap().to_string()
    }

    pub async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Response<Body> {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        app.clone().oneshot(request).await.unwrap()
    }

    pub async fn json(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
