use axum::{
    Json,
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    response::Redirect,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, warn};
use utoipa::IntoParams;

use super::AppState;
use crate::{
    auth::{GoogleOAuth, Identity},
    error::{Error, Result},
    user::{self, Role, User},
};

pub const USER_ID_KEY: &str = "user_id";
pub const OAUTH_STATE_KEY: &str = "oauth_state";

/// The logged-in user, loaded from the id stored in the session.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl Identity for CurrentUser {
    fn user_id(&self) -> i64 {
        self.0.id
    }
    fn role(&self) -> Role {
        self.0.role
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, message)| Error::Internal(anyhow::anyhow!(message)))?;
        let Some(user_id) = session.get::<i64>(USER_ID_KEY).await? else {
            return Err(Error::Unauthorized);
        };
        match user::get_user(&state.database, user_id).await? {
            Some(user) => Ok(CurrentUser(user)),
            None => {
                // account removed since login
                session.flush().await?;
                Err(Error::Unauthorized)
            }
        }
    }
}

#[utoipa::path(
    get,
    path = "/auth/google/login",
    responses(
        (status = 303, description = "Redirect to Google's consent screen"),
        (status = 503, description = "Google login is not configured")
    )
)]
pub async fn google_login(State(state): State<AppState>, session: Session) -> Result<Redirect> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or(Error::NotConfigured("Google login"))?;
    let csrf = GoogleOAuth::new_state();
    session.insert(OAUTH_STATE_KEY, &csrf).await?;
    let url = oauth.authorize_url(&csrf)?;
    Ok(Redirect::to(url.as_str()))
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[utoipa::path(
    get,
    path = "/auth/google/callback",
    params(CallbackParams),
    responses(
        (status = 303, description = "Logged in; redirect to the front page"),
        (status = 400, description = "Missing code or state mismatch"),
        (status = 502, description = "Google rejected the exchange")
    )
)]
pub async fn google_callback(
    State(state): State<AppState>,
    session: Session,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let oauth = state
        .oauth
        .as_ref()
        .ok_or(Error::NotConfigured("Google login"))?;
    if let Some(error) = params.error {
        return Err(Error::BadRequest(format!("login was not completed: {error}")));
    }
    let expected = session.remove::<String>(OAUTH_STATE_KEY).await?;
    if expected.is_none() || expected != params.state {
        warn!("oauth callback with mismatched state");
        return Err(Error::BadRequest("login state mismatch".to_string()));
    }
    let code = params
        .code
        .ok_or_else(|| Error::BadRequest("missing authorization code".to_string()))?;

    let identity = oauth.exchange_code(&code).await?;
    let user = user::find_or_create_from_identity(&state.database, &identity).await?;
    session.cycle_id().await?;
    session.insert(USER_ID_KEY, user.id).await?;
    info!("user {} <{}> logged in", user.id, user.email);
    Ok(Redirect::to("/"))
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 200, description = "Logout successful"))
)]
pub async fn logout(State(state): State<AppState>, session: Session) -> Result<Json<&'static str>> {
    if let Some(user_id) = session.get::<i64>(USER_ID_KEY).await? {
        state.tutor_sessions.invalidate(&user_id).await;
    }
    session.flush().await?;
    Ok(Json("Logout successful"))
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not logged in")
    )
)]
pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user)
}
