//! User and profile record stores.
//!
//! Narrow persistence interfaces the auth core consumes: look up a user by
//! email, create one with a fresh stable id, and ensure an associated profile
//! row exists. Everything else about these entities belongs to other handlers.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::claims::{IdentityClaims, ROLE_USER};
use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub provider: String,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub registered: bool,
}

#[derive(Clone)]
pub struct UserStore {
    pool: PgPool,
}

impl UserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_email(&self, email: &str) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, provider, roles, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id(&self, user_id: Uuid) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT user_id, email, provider, roles, created_at, updated_at \
             FROM users WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Create a user with a fresh stable id and the default role.
    pub async fn create(&self, email: &str, provider: &str) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, email, provider, roles, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NOW(), NOW())
            RETURNING user_id, email, provider, roles, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(provider)
        .bind(vec![ROLE_USER.to_string()])
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn list(&self, limit: i64) -> ApiResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            "SELECT user_id, email, provider, roles, created_at, updated_at \
             FROM users ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}

#[derive(Clone)]
pub struct ProfileStore {
    pool: PgPool,
}

impl ProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user_id(&self, user_id: Uuid) -> ApiResult<Option<Profile>> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT user_id, email, first_name, last_name, registered \
             FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(profile)
    }

    /// Create a minimal profile from verified identity claims. The user
    /// completes it later through the registration flow.
    pub async fn create_minimal(
        &self,
        user_id: Uuid,
        identity: &IdentityClaims,
    ) -> ApiResult<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            r#"
            INSERT INTO profiles (user_id, email, first_name, last_name, registered, created_at, updated_at)
            VALUES ($1, $2, $3, $4, FALSE, NOW(), NOW())
            RETURNING user_id, email, first_name, last_name, registered
            "#,
        )
        .bind(user_id)
        .bind(&identity.email)
        .bind(&identity.first_name)
        .bind(&identity.last_name)
        .fetch_one(&self.pool)
        .await?;

        Ok(profile)
    }
}
