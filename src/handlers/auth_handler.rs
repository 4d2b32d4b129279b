use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{MealStats, User};
use crate::services::auth::{normalize_email, validate_name, validate_password};
use crate::services::{AuthService, Database};

#[derive(Debug, Deserialize, Serialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub stats: MealStats,
}

pub struct AuthHandler {
    db: Arc<Database>,
    auth: Arc<AuthService>,
}

impl AuthHandler {
    pub fn new(db: Arc<Database>, auth: Arc<AuthService>) -> Self {
        Self { db, auth }
    }

    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResponse> {
        let email = normalize_email(&request.email)?;
        let name = validate_name(&request.name)?;
        validate_password(&request.password)?;

        if self.db.get_user_by_email(&email).await?.is_some() {
            return Err(ApiError::EmailTaken.into());
        }

        let user = User {
            id: Uuid::new_v4(),
            email,
            name,
            password_hash: self.auth.hash_password(&request.password).await?,
            created_at: Utc::now(),
        };
        self.db.create_user(&user).await?;
        log::info!("✅ New user created: {} ({})", user.email, user.id);

        Ok(AuthResponse {
            token: self.auth.issue_token(user.id),
            user,
        })
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let email = normalize_email(&request.email).map_err(|_| ApiError::InvalidCredentials)?;

        let user = self
            .db
            .get_user_by_email(&email)
            .await?
            .ok_or(ApiError::InvalidCredentials)?;

        if !self.auth.verify_password(&request.password, &user.password_hash).await? {
            log::warn!("⚠️ Failed login attempt for {}", email);
            return Err(ApiError::InvalidCredentials.into());
        }

        log::info!("🔐 User logged in: {}", user.id);
        Ok(AuthResponse {
            token: self.auth.issue_token(user.id),
            user,
        })
    }

    pub async fn profile(&self, user_id: Uuid) -> Result<ProfileResponse> {
        // A valid token for a deleted user is treated like no token at all
        let user = self.db.get_user(user_id).await?.ok_or(ApiError::Unauthorized)?;
        let stats = self.db.get_meal_stats(user_id, Utc::now().date_naive()).await?;

        Ok(ProfileResponse { user, stats })
    }
}
