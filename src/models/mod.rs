use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,  // always stored lowercased
    pub name: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub image_path: Option<String>,  // local file written by the image store
    pub image_url: Option<String>,   // public URL under /uploads
    pub comments: Option<String>,
    pub calories: f64,
    pub description: Option<String>,
    pub breakdown: Option<String>,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
}

/// Meal as returned by the JSON API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealResponse {
    pub id: Uuid,
    pub image_path: String,
    pub image_url: Option<String>,
    pub comments: Option<String>,
    pub calories: f64,
    pub created_at: DateTime<Utc>,
    pub gemini_analysis: Option<String>,  // kept for existing mobile clients
    pub breakdown: Option<String>,
    pub confidence_score: f64,
}

impl From<&Meal> for MealResponse {
    fn from(meal: &Meal) -> Self {
        Self {
            id: meal.id,
            image_path: meal.image_path.clone().unwrap_or_default(),
            image_url: meal.image_url.clone(),
            comments: meal.comments.clone(),
            calories: meal.calories,
            created_at: meal.created_at,
            gemini_analysis: meal.description.clone(),
            breakdown: meal.breakdown.clone(),
            confidence_score: meal.confidence_score,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealStats {
    pub total_meals: i64,
    pub total_calories: f64,
    pub average_calories: f64,
    pub today_meals: i64,
    pub today_calories: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_meal() -> Meal {
        Meal {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            image_path: None,
            image_url: None,
            comments: Some("lunch".to_string()),
            calories: 420.0,
            description: Some("sandwich".to_string()),
            breakdown: Some("bread, ham".to_string()),
            confidence_score: 0.8,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_meal_response_shape() {
        let meal = sample_meal();
        let json = serde_json::to_value(MealResponse::from(&meal)).unwrap();

        assert_eq!(json["image_path"], "");
        assert_eq!(json["gemini_analysis"], "sandwich");
        assert_eq!(json["calories"], 420.0);
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_password_hash_is_never_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            name: "Test User".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("secret"));
    }
}
