use anyhow::Result;
use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};

use crate::services::ai_service::AIService;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

const ANALYSIS_PROMPT: &str = "You are a nutrition expert. Look carefully at this food photo.\n\
    \n\
    1. Identify every food and drink in the picture (main dish, sides, beverages).\n\
    2. Estimate the portion size of each item from the image.\n\
    3. Estimate realistic calories for each item and add them up.\n\
    \n\
    Answer with ONE JSON object and nothing else, using exactly these keys:\n\
    {\"description\": \"short name of the meal\", \
    \"total_calories\": <number, kcal, no unit>, \
    \"breakdown\": \"item-by-item calorie estimate\", \
    \"confidence_score\": <number between 0 and 1>}";

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData
    },
}

#[derive(Debug, Serialize)]
struct ImageData {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Debug, Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenRouterService {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterService {
    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, image: &[u8], mime_type: &str, comments: Option<&str>) -> ChatRequest {
        let base64_image = general_purpose::STANDARD.encode(image);
        let data_url = format!("data:{};base64,{}", mime_type, base64_image);
        log::debug!("🔄 Base64 encoded size: {} bytes", base64_image.len());

        let mut prompt = ANALYSIS_PROMPT.to_string();
        if let Some(comments) = comments.map(str::trim).filter(|c| !c.is_empty()) {
            prompt.push_str("\n\nThe user added this note about the meal: ");
            prompt.push_str(comments);
        }

        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: vec![
                    ContentPart::Text {
                        content_type: "text".to_string(),
                        text: prompt,
                    },
                    ContentPart::ImageUrl {
                        content_type: "image_url".to_string(),
                        image_url: ImageData { url: data_url },
                    },
                ],
            }],
            max_tokens: 500,
        }
    }
}

#[async_trait::async_trait]
impl AIService for OpenRouterService {
    async fn analyze_food_image(
        &self,
        image: &[u8],
        mime_type: &str,
        comments: Option<&str>,
    ) -> Result<String> {
        log::debug!("📊 Image size: {} bytes ({})", image.len(), mime_type);

        let request = self.build_request(image, mime_type, comments);

        log::info!("🤖 Sending request to OpenRouter with model: {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", "https://github.com/meal-calorie-tracker")
            .header("X-Title", "Meal Calorie Tracker")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        log::debug!("📥 OpenRouter response status: {}", status);

        if !status.is_success() {
            let error_text = response.text().await?;
            log::error!("❌ OpenRouter API error response: {}", error_text);
            anyhow::bail!("OpenRouter API error ({}): {}", status, error_text);
        }

        let chat_response: ChatResponse = response.json().await?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("OpenRouter returned no choices"))?
            .message
            .content
            .unwrap_or_default();

        log::info!("💬 OpenRouter response content: {}", content);
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn service(base_url: String) -> OpenRouterService {
        OpenRouterService::with_base_url("test_key".to_string(), "test_model".to_string(), base_url)
    }

    #[test]
    fn test_build_request_includes_image_and_comment() {
        let service = service(DEFAULT_BASE_URL.to_string());
        let request = service.build_request(b"abc", "image/png", Some("  homemade, no oil "));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "test_model");
        assert_eq!(json["max_tokens"], 500);

        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert!(content[0]["text"].as_str().unwrap().ends_with("homemade, no oil"));
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,YWJj");
    }

    #[test]
    fn test_build_request_skips_blank_comment() {
        let service = service(DEFAULT_BASE_URL.to_string());
        let request = service.build_request(b"abc", "image/jpeg", Some("   "));
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["messages"][0]["content"][0]["text"], ANALYSIS_PROMPT);
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let service = service("http://localhost:9999/api/".to_string());
        assert_eq!(service.base_url, "http://localhost:9999/api");
    }

    #[tokio::test]
    async fn test_analyze_returns_message_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("Authorization", "Bearer test_key");
                then.status(200).json_body(serde_json::json!({
                    "choices": [
                        {"message": {"role": "assistant", "content": "{\"description\":\"a banana\",\"total_calories\":95}"}}
                    ]
                }));
            })
            .await;

        let raw = service(server.base_url())
            .analyze_food_image(b"fake image", "image/jpeg", None)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(raw, "{\"description\":\"a banana\",\"total_calories\":95}");
    }

    #[tokio::test]
    async fn test_analyze_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(429).body("rate limited");
            })
            .await;

        let result = service(server.base_url())
            .analyze_food_image(b"fake image", "image/jpeg", None)
            .await;

        let err = result.unwrap_err().to_string();
        assert!(err.contains("429"));
        assert!(err.contains("rate limited"));
    }

    #[tokio::test]
    async fn test_analyze_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(serde_json::json!({"choices": []}));
            })
            .await;

        let result = service(server.base_url())
            .analyze_food_image(b"fake image", "image/jpeg", None)
            .await;

        assert!(result.is_err());
    }
}
