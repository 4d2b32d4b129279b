use thiserror::Error;

/// Failures the HTTP layer reports with a specific status code.
/// Carried inside `anyhow::Error` and recovered with `downcast_ref`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Email is already registered")]
    EmailTaken,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Missing or invalid authorization token")]
    Unauthorized,

    #[error("Meal not found")]
    MealNotFound,

    #[error("Invalid upload: {0}")]
    BadUpload(String),
}
