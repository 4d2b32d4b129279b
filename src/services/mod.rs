pub mod ai_service;
pub mod auth;
pub mod database;
pub mod openrouter; // OpenRouter AI service
pub mod response_interpreter;
pub mod storage; // Uploaded meal photos

pub use ai_service::AIService;
pub use auth::AuthService;
pub use database::Database;
pub use openrouter::OpenRouterService;
pub use response_interpreter::{interpret_response, AnalysisResult};
pub use storage::{ImageStore, StoredImage};
