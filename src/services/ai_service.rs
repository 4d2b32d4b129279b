use anyhow::Result;

/// Trait for AI services (OpenRouter, or a stub in tests)
///
/// Implementations return the model's raw answer; interpreting it is left to
/// `response_interpreter::interpret_response`.
#[async_trait::async_trait]
pub trait AIService: Send + Sync {
    async fn analyze_food_image(
        &self,
        image: &[u8],
        mime_type: &str,
        comments: Option<&str>,
    ) -> Result<String>;
}
