use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Meal, MealResponse, MealStats};
use crate::services::{interpret_response, AIService, AnalysisResult, Database, ImageStore, StoredImage};

pub const DEFAULT_HISTORY_LIMIT: i64 = 50;
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Image part of a multipart upload
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub meal: MealResponse,
    pub analysis: AnalysisResult,
}

#[derive(Debug, Serialize)]
pub struct MealHistoryResponse {
    pub meals: Vec<MealResponse>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: Uuid,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

impl HistoryQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT)
    }
}

pub struct MealHandler {
    db: Arc<Database>,
    ai: Arc<dyn AIService>,
    images: Arc<ImageStore>,
}

impl MealHandler {
    pub fn new(db: Arc<Database>, ai: Arc<dyn AIService>, images: Arc<ImageStore>) -> Self {
        Self { db, ai, images }
    }

    /// Store the photo, ask the model about it and persist the meal.
    /// Problems with the model never fail the upload; they show up as a
    /// low-confidence analysis instead.
    pub async fn upload_meal(
        &self,
        user_id: Uuid,
        image: UploadedImage,
        comments: Option<String>,
    ) -> Result<UploadResponse> {
        log::info!("📸 Meal upload from {} ({} bytes)", user_id, image.bytes.len());

        let comments = comments
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let stored = self
            .images
            .save(&image.bytes, image.content_type.as_deref(), image.file_name.as_deref())
            .await?;

        let analysis = self.analyze(&image.bytes, &stored.mime_type, comments.as_deref()).await;
        log::info!(
            "🍽️ Analysis for {}: {} kcal (confidence {:.2})",
            user_id,
            analysis.total_calories,
            analysis.confidence_score
        );

        let meal = build_meal(user_id, &stored, comments, &analysis);
        if let Err(e) = self.db.add_meal(&meal).await {
            // don't leave an orphaned file behind
            if let Err(cleanup) = self.images.delete(&stored.path).await {
                log::warn!("⚠️ Could not remove image {} after failed insert: {}", stored.path, cleanup);
            }
            return Err(e);
        }

        Ok(UploadResponse {
            message: "Meal uploaded and analyzed successfully".to_string(),
            meal: MealResponse::from(&meal),
            analysis,
        })
    }

    async fn analyze(&self, image: &[u8], mime_type: &str, comments: Option<&str>) -> AnalysisResult {
        let raw = match self.ai.analyze_food_image(image, mime_type, comments).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("⚠️ AI analysis failed, storing meal without estimate: {}", e);
                String::new()
            }
        };

        interpret_response(&raw)
    }

    pub async fn history(&self, user_id: Uuid, query: &HistoryQuery) -> Result<MealHistoryResponse> {
        let meals = self.db.get_meal_history(user_id, query.effective_limit()).await?;

        Ok(MealHistoryResponse {
            meals: meals.iter().map(MealResponse::from).collect(),
        })
    }

    pub async fn get_meal(&self, user_id: Uuid, meal_id: Uuid) -> Result<MealResponse> {
        let meal = self
            .db
            .get_meal(user_id, meal_id)
            .await?
            .ok_or(ApiError::MealNotFound)?;

        Ok(MealResponse::from(&meal))
    }

    pub async fn delete_meal(&self, user_id: Uuid, meal_id: Uuid) -> Result<DeleteResponse> {
        let meal = self
            .db
            .get_meal(user_id, meal_id)
            .await?
            .ok_or(ApiError::MealNotFound)?;

        if !self.db.delete_meal(user_id, meal_id).await? {
            return Err(ApiError::MealNotFound.into());
        }

        if let Some(path) = meal.image_path.as_deref() {
            if let Err(e) = self.images.delete(path).await {
                log::warn!("⚠️ Meal {} deleted but its image was not: {}", meal_id, e);
            }
        }

        log::info!("🗑️ Meal {} deleted by {}", meal_id, user_id);
        Ok(DeleteResponse { deleted: meal_id })
    }

    pub async fn stats(&self, user_id: Uuid) -> Result<MealStats> {
        self.db.get_meal_stats(user_id, Utc::now().date_naive()).await
    }
}

fn build_meal(
    user_id: Uuid,
    stored: &StoredImage,
    comments: Option<String>,
    analysis: &AnalysisResult,
) -> Meal {
    Meal {
        id: Uuid::new_v4(),
        user_id,
        image_path: Some(stored.path.clone()),
        image_url: Some(stored.url.clone()),
        comments,
        calories: analysis.total_calories,
        description: Some(analysis.description.clone()),
        breakdown: Some(analysis.breakdown.clone()),
        confidence_score: analysis.confidence_score,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    struct StubAI {
        response: Option<String>,
    }

    #[async_trait::async_trait]
    impl AIService for StubAI {
        async fn analyze_food_image(&self, _image: &[u8], _mime_type: &str, _comments: Option<&str>) -> Result<String> {
            match &self.response {
                Some(raw) => Ok(raw.clone()),
                None => anyhow::bail!("model unavailable"),
            }
        }
    }

    fn handler(response: Option<&str>) -> MealHandler {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        MealHandler::new(
            Arc::new(Database::from_pool(pool)),
            Arc::new(StubAI { response: response.map(str::to_string) }),
            Arc::new(ImageStore::new(std::env::temp_dir(), "http://localhost:8080")),
        )
    }

    #[tokio::test]
    async fn test_analyze_uses_model_answer() {
        let raw = r#"{"description":"a banana","total_calories":95,"breakdown":"1 banana","confidence_score":0.9}"#;
        let analysis = handler(Some(raw)).analyze(b"img", "image/jpeg", None).await;

        assert_eq!(analysis.description, "a banana");
        assert_eq!(analysis.total_calories, 95.0);
        assert_eq!(analysis.confidence_score, 0.9);
    }

    #[tokio::test]
    async fn test_analyze_model_error_gives_default() {
        let analysis = handler(None).analyze(b"img", "image/jpeg", Some("banana")).await;
        assert_eq!(analysis, AnalysisResult::no_response());
    }

    #[tokio::test]
    async fn test_failed_insert_removes_stored_image() {
        let dir = tempfile::tempdir().unwrap();
        // nothing listens on port 1, so the insert fails fast
        let pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(500))
            .connect_lazy("postgres://127.0.0.1:1/unused")
            .unwrap();
        let handler = MealHandler::new(
            Arc::new(Database::from_pool(pool)),
            Arc::new(StubAI { response: Some("about 300 calories".to_string()) }),
            Arc::new(ImageStore::new(dir.path().to_path_buf(), "http://localhost:8080")),
        );

        let image = UploadedImage {
            bytes: b"fake jpeg".to_vec(),
            content_type: Some("image/jpeg".to_string()),
            file_name: Some("lunch.jpg".to_string()),
        };

        let result = handler.upload_meal(Uuid::new_v4(), image, None).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_build_meal_copies_analysis() {
        let user_id = Uuid::new_v4();
        let stored = StoredImage {
            path: "/tmp/uploads/x.jpg".to_string(),
            url: "http://localhost:8080/uploads/x.jpg".to_string(),
            mime_type: "image/jpeg".to_string(),
        };
        let analysis = interpret_response("I see a sandwich with about 420 calories total.");

        let meal = build_meal(user_id, &stored, Some("lunch".to_string()), &analysis);

        assert_eq!(meal.user_id, user_id);
        assert_eq!(meal.calories, 420.0);
        assert_eq!(meal.confidence_score, 0.8);
        assert_eq!(meal.description.as_deref(), Some("I see a sandwich with about 420 calories total."));
        assert_eq!(meal.image_url.as_deref(), Some("http://localhost:8080/uploads/x.jpg"));
        assert_eq!(meal.comments.as_deref(), Some("lunch"));
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(HistoryQuery::default().effective_limit(), 50);
        assert_eq!(HistoryQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(HistoryQuery { limit: Some(10) }.effective_limit(), 10);
        assert_eq!(HistoryQuery { limit: Some(5000) }.effective_limit(), 200);
    }
}
