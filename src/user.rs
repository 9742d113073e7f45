use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::info;
use utoipa::ToSchema;

use crate::{auth::GoogleIdentity, error::Result, utils::now_utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Teacher,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "student" => Ok(Role::Student),
            "teacher" => Ok(Role::Teacher),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn create_user(
    database: &SqlitePool,
    username: String,
    email: String,
    role: Role,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO user (username, email, role, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id, username, email, role, created_at",
    )
    .bind(username)
    .bind(email)
    .bind(role)
    .bind(now_utc())
    .fetch_one(database)
    .await?;
    info!("created user {} <{}> as {}", user.id, user.email, user.role);
    Ok(user)
}

pub async fn get_user(database: &SqlitePool, id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, role, created_at FROM user WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(user)
}

pub async fn get_user_by_email(database: &SqlitePool, email: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, role, created_at FROM user WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(database)
    .await?;
    Ok(user)
}

pub async fn list_users(database: &SqlitePool, role: Option<Role>) -> Result<Vec<User>> {
    let users = match role {
        Some(role) => {
            sqlx::query_as::<_, User>(
                "SELECT id, username, email, role, created_at FROM user WHERE role = ? ORDER BY id",
            )
            .bind(role)
            .fetch_all(database)
            .await?
        }
        None => {
            sqlx::query_as::<_, User>(
                "SELECT id, username, email, role, created_at FROM user ORDER BY id",
            )
            .fetch_all(database)
            .await?
        }
    };
    Ok(users)
}

/// Change username and/or role; `None` keeps the stored value.
pub async fn update_user(
    database: &SqlitePool,
    id: i64,
    username: Option<String>,
    role: Option<Role>,
) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "UPDATE user SET username = COALESCE(?, username), role = COALESCE(?, role) WHERE id = ? \
         RETURNING id, username, email, role, created_at",
    )
    .bind(username)
    .bind(role)
    .bind(id)
    .fetch_optional(database)
    .await?;
    Ok(user)
}

/// Fails with a foreign-key violation while the user still owns lessons or progress.
pub async fn delete_user(database: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM user WHERE id = ?")
        .bind(id)
        .execute(database)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// First OAuth login creates a student; later logins return the existing row.
pub async fn find_or_create_from_identity(
    database: &SqlitePool,
    identity: &GoogleIdentity,
) -> Result<User> {
    if let Some(user) = get_user_by_email(database, &identity.email).await? {
        return Ok(user);
    }
    let username = identity
        .name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| {
            identity
                .email
                .split('@')
                .next()
                .unwrap_or(&identity.email)
                .to_string()
        });
    match create_user(database, username, identity.email.clone(), Role::Student).await {
        // a concurrent first login inserted the row between the lookup and here
        Err(e) if e.is_unique_violation() => get_user_by_email(database, &identity.email)
            .await?
            .ok_or(e),
        result => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    #[tokio::test]
    async fn create_and_get_user() {
        let database = open_in_memory().await.unwrap();
        let user = create_user(&database, "ada".into(), "ada@example.com".into(), Role::default())
            .await
            .unwrap();
        assert_eq!(user.role, Role::Student);

        let fetched = get_user(&database, user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);
        let by_email = get_user_by_email(&database, "ada@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
        assert!(get_user(&database, user.id + 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected_and_first_row_kept() {
        let database = open_in_memory().await.unwrap();
        let first = create_user(&database, "ada".into(), "ada@example.com".into(), Role::Student)
            .await
            .unwrap();
        let err = create_user(&database, "imposter".into(), "ada@example.com".into(), Role::Admin)
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());

        let users = list_users(&database, None).await.unwrap();
        assert_eq!(users, vec![first]);
    }

    #[tokio::test]
    async fn unknown_role_violates_check() {
        let database = open_in_memory().await.unwrap();
        let result = sqlx::query(
            "INSERT INTO user (username, email, role, created_at) \
             VALUES ('x', 'x@x', 'wizard', '')",
        )
        .execute(&database)
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn list_filters_by_role() {
        let database = open_in_memory().await.unwrap();
        create_user(&database, "s".into(), "s@example.com".into(), Role::Student).await.unwrap();
        create_user(&database, "t".into(), "t@example.com".into(), Role::Teacher).await.unwrap();
        let teachers = list_users(&database, Some(Role::Teacher)).await.unwrap();
        assert_eq!(teachers.len(), 1);
        assert_eq!(teachers[0].username, "t");
    }

    #[tokio::test]
    async fn update_keeps_unset_fields() {
        let database = open_in_memory().await.unwrap();
        let user = create_user(&database, "s".into(), "s@example.com".into(), Role::Student)
            .await
            .unwrap();
        let updated = update_user(&database, user.id, None, Some(Role::Teacher))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.username, "s");
        assert_eq!(updated.role, Role::Teacher);
        assert!(update_user(&database, 999, Some("x".into()), None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_user_without_dependents() {
        let database = open_in_memory().await.unwrap();
        let user = create_user(&database, "s".into(), "s@example.com".into(), Role::Student)
            .await
            .unwrap();
        assert!(delete_user(&database, user.id).await.unwrap());
        assert!(!delete_user(&database, user.id).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_first_logins_share_one_account() {
        let database = open_in_memory().await.unwrap();
        let identity = GoogleIdentity {
            subject: "42".into(),
            email: "lin@example.com".into(),
            name: Some("Lin".into()),
        };
        let (a, b) = tokio::join!(
            find_or_create_from_identity(&database, &identity),
            find_or_create_from_identity(&database, &identity),
        );
        assert_eq!(a.unwrap().id, b.unwrap().id);
        assert_eq!(list_users(&database, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn identity_login_is_idempotent() {
        let database = open_in_memory().await.unwrap();
        let identity = GoogleIdentity {
            subject: "1234".into(),
            email: "grace@example.com".into(),
            name: None,
        };
        let first = find_or_create_from_identity(&database, &identity).await.unwrap();
        assert_eq!(first.username, "grace");
        assert_eq!(first.role, Role::Student);
        let second = find_or_create_from_identity(&database, &identity).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::Student, Role::Teacher, Role::Admin] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("principal".parse::<Role>().is_err());
    }
}
