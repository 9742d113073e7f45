//! Google OAuth login and the identity capability handlers authorise against.
//!
//! The persisted [`User`] stays a plain record; request-scoped identity is the
//! job of [`CurrentUser`](crate::api::auth::CurrentUser), which implements
//! [`Identity`].

use rand::{Rng, distr::Alphanumeric};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    config::GoogleConfig,
    error::{Error, Result},
    user::{Role, User},
};

pub const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const SCOPES: &str = "openid email profile";

/// An authenticated principal.
pub trait Identity {
    fn user_id(&self) -> i64;
    fn role(&self) -> Role;

    /// Teachers and admins may create and change lessons and quizzes.
    fn is_instructor(&self) -> bool {
        matches!(self.role(), Role::Teacher | Role::Admin)
    }

    fn require_instructor(&self) -> Result<()> {
        if self.is_instructor() {
            Ok(())
        } else {
            Err(Error::Forbidden("instructor role required".to_string()))
        }
    }

    fn require_admin(&self) -> Result<()> {
        if self.role() == Role::Admin {
            Ok(())
        } else {
            Err(Error::Forbidden("admin role required".to_string()))
        }
    }

    /// Own data, or anyone's data for instructors.
    fn can_access_student(&self, student_id: i64) -> bool {
        self.user_id() == student_id || self.is_instructor()
    }
}

impl Identity for User {
    fn user_id(&self) -> i64 {
        self.id
    }
    fn role(&self) -> Role {
        self.role
    }
}

/// What the provider vouches for after a successful login.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleIdentity {
    pub subject: String,
    pub email: String,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    #[serde(default)]
    email_verified: bool,
    name: Option<String>,
}

impl TryFrom<UserInfo> for GoogleIdentity {
    type Error = Error;
    fn try_from(info: UserInfo) -> Result<Self> {
        let Some(email) = info.email else {
            return Err(Error::OAuth("provider returned no e-mail address".to_string()));
        };
        if !info.email_verified {
            return Err(Error::OAuth(format!("e-mail {email} is not verified")));
        }
        Ok(Self {
            subject: info.sub,
            email,
            name: info.name,
        })
    }
}

#[derive(Debug, Clone)]
pub struct GoogleOAuth {
    config: GoogleConfig,
    http: reqwest::Client,
}

impl GoogleOAuth {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Random CSRF token to round-trip through the `state` parameter.
    pub fn new_state() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect()
    }

    pub fn authorize_url(&self, state: &str) -> Result<Url> {
        Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("state", state),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| Error::Internal(e.into()))
    }

    /// Trade an authorisation code for the caller's verified identity.
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleIdentity> {
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| Error::OAuth(format!("token request failed: {e}")))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("token exchange rejected with {}: {}", status, body);
            return Err(Error::OAuth(format!("token exchange rejected with {status}")));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("invalid token response: {e}")))?;

        let info: UserInfo = self
            .http
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::OAuth(format!("userinfo request failed: {e}")))?
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("invalid userinfo response: {e}")))?;
        debug!("google login for subject {}", info.sub);
        info.try_into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn oauth() -> GoogleOAuth {
        GoogleOAuth::new(GoogleConfig {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            redirect_url: "http://localhost:5000/auth/google/callback".into(),
        })
    }

    #[test]
    fn authorize_url_carries_client_and_state() {
        let url = oauth().authorize_url("abc").unwrap();
        assert!(url.as_str().starts_with(AUTHORIZE_URL));
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&("client_id".into(), "client-123".into())));
        assert!(params.contains(&("state".into(), "abc".into())));
        assert!(params.contains(&("scope".into(), "openid email profile".into())));
        assert!(params.contains(&(
            "redirect_uri".into(),
            "http://localhost:5000/auth/google/callback".into()
        )));
    }

    #[test]
    fn states_are_random() {
        let a = GoogleOAuth::new_state();
        let b = GoogleOAuth::new_state();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }

    #[test]
    fn unverified_email_is_rejected() {
        let info = UserInfo {
            sub: "1".into(),
            email: Some("a@example.com".into()),
            email_verified: false,
            name: None,
        };
        assert!(matches!(GoogleIdentity::try_from(info), Err(Error::OAuth(_))));
    }

    #[test]
    fn userinfo_parses_into_identity() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "sub": "42",
            "email": "a@example.com",
            "email_verified": true,
            "name": "Ada",
            "picture": "x",
        }))
        .unwrap();
        let identity = GoogleIdentity::try_from(info).unwrap();
        assert_eq!(identity.subject, "42");
        assert_eq!(identity.name.as_deref(), Some("Ada"));
    }

    #[test]
    fn roles_gate_instructor_actions() {
        let mut user = User {
            id: 1,
            username: "s".into(),
            email: "s@example.com".into(),
            role: Role::Student,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(user.require_instructor().is_err());
        assert!(user.can_access_student(1));
        assert!(!user.can_access_student(2));
        user.role = Role::Teacher;
        assert!(user.require_instructor().is_ok());
        assert!(user.require_admin().is_err());
        assert!(user.can_access_student(2));
    }
}
