use std::path::Path;
use std::sync::Arc;

use axum::{
    async_trait,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, PathRejection, QueryRejection},
        DefaultBodyLimit, FromRequestParts, Multipart, Path as UrlPath, Query, State,
    },
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, services::ServeDir};
use uuid::Uuid;

use crate::error::ApiError;
use crate::handlers::auth_handler::{AuthResponse, LoginRequest, ProfileResponse, SignupRequest};
use crate::handlers::meal_handler::{
    DeleteResponse, HistoryQuery, MealHistoryResponse, UploadResponse, UploadedImage,
};
use crate::handlers::{AuthHandler, MealHandler};
use crate::models::{MealResponse, MealStats};
use crate::services::auth::bearer_token;
use crate::services::AuthService;

pub struct AppState {
    pub auth_handler: Arc<AuthHandler>,
    pub meal_handler: Arc<MealHandler>,
    pub auth: Arc<AuthService>,
}

pub fn create_router(state: AppState, upload_dir: &Path, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/user/profile", get(profile))
        .route("/meals/upload", post(upload_meal))
        .route("/meals/history", get(meal_history))
        .route("/meals/stats", get(meal_stats))
        .route("/meals/:id", get(get_meal).delete(delete_meal))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(Arc::new(state))
}

/// JSON error body: `{"error": "..."}`
#[derive(Debug)]
pub struct ErrorResponse {
    status: StatusCode,
    message: String,
}

impl From<ApiError> for ErrorResponse {
    fn from(err: ApiError) -> Self {
        let status = match err {
            ApiError::InvalidInput(_) | ApiError::BadUpload(_) => StatusCode::BAD_REQUEST,
            ApiError::EmailTaken => StatusCode::CONFLICT,
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::MealNotFound => StatusCode::NOT_FOUND,
        };

        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for ErrorResponse {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<ApiError>() {
            Some(api_error) => api_error.clone().into(),
            None => {
                log::error!("❌ Request failed: {:#}", err);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: "Internal server error".to_string(),
                }
            }
        }
    }
}

macro_rules! invalid_input_from {
    ($($rejection:ty),*) => {
        $(
            impl From<$rejection> for ErrorResponse {
                fn from(rejection: $rejection) -> Self {
                    ApiError::InvalidInput(rejection.body_text()).into()
                }
            }
        )*
    };
}

// axum's own rejections are plain text; keep every error body JSON
invalid_input_from!(JsonRejection, QueryRejection, PathRejection, MultipartRejection);

impl IntoResponse for ErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// User id taken from a valid `Authorization: Bearer` token
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ErrorResponse;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(bearer_token)
            .and_then(|token| state.auth.verify_token(token))
            .map(AuthUser)
            .ok_or_else(|| ApiError::Unauthorized.into())
    }
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(json!({ "message": "Calorie Tracking API is running" }))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

async fn signup(
    State(state): State<Arc<AppState>>,
    request: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ErrorResponse> {
    let Json(request) = request?;
    let response = state.auth_handler.signup(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
    State(state): State<Arc<AppState>>,
    request: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ErrorResponse> {
    let Json(request) = request?;
    Ok(Json(state.auth_handler.login(request).await?))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ErrorResponse> {
    Ok(Json(state.auth_handler.profile(user_id).await?))
}

async fn upload_meal(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ErrorResponse> {
    let mut multipart = multipart?;
    let mut image = None;
    let mut comments = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadUpload(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field.content_type().map(str::to_string);
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadUpload(e.to_string()))?;

                image = Some(UploadedImage {
                    bytes: bytes.to_vec(),
                    content_type,
                    file_name,
                });
            }
            "comments" => {
                comments = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| ApiError::BadUpload(e.to_string()))?,
                );
            }
            other => log::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let image = image.ok_or_else(|| ApiError::BadUpload("no image provided".to_string()))?;
    Ok(Json(state.meal_handler.upload_meal(user_id, image, comments).await?))
}

async fn meal_history(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> Result<Json<MealHistoryResponse>, ErrorResponse> {
    let Query(query) = query?;
    Ok(Json(state.meal_handler.history(user_id, &query).await?))
}

async fn meal_stats(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MealStats>, ErrorResponse> {
    Ok(Json(state.meal_handler.stats(user_id).await?))
}

async fn get_meal(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    meal_id: Result<UrlPath<Uuid>, PathRejection>,
) -> Result<Json<MealResponse>, ErrorResponse> {
    let UrlPath(meal_id) = meal_id?;
    Ok(Json(state.meal_handler.get_meal(user_id, meal_id).await?))
}

async fn delete_meal(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    meal_id: Result<UrlPath<Uuid>, PathRejection>,
) -> Result<Json<DeleteResponse>, ErrorResponse> {
    let UrlPath(meal_id) = meal_id?;
    Ok(Json(state.meal_handler.delete_meal(user_id, meal_id).await?))
}
