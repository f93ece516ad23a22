//! [`MealPlanGenerator`] over an OpenAI-compatible chat completions API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{GenerationError, MealPlanGenerator, PhotoAnalysis};
use crate::plan::candidate::{CandidatePlan, parse_candidate_plan, parse_generated_json};
use crate::plan::prompt::{
    PHOTO_SYSTEM_PROMPT, PHOTO_USER_PROMPT, PLAN_SYSTEM_PROMPT, build_plan_prompt,
};
use crate::plan::request::GenerationRequest;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

const PLAN_MAX_TOKENS: u32 = 16_000;
const PHOTO_MAX_TOKENS: u32 = 1_000;
const PLAN_TEMPERATURE: f32 = 0.7;

/// Error bodies are cut to this many characters before they reach logs.
const ERROR_BODY_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenAiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Upper bound on one whole request, including reading the body.
    pub timeout: Duration,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

pub struct OpenAiGenerator {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiGenerator {
    pub fn new(config: OpenAiConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn api_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn plan_body(&self, request: &GenerationRequest) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": PLAN_SYSTEM_PROMPT},
                {"role": "user", "content": build_plan_prompt(request)},
            ],
            "response_format": {"type": "json_object"},
            "temperature": PLAN_TEMPERATURE,
            "max_tokens": PLAN_MAX_TOKENS,
        })
    }

    fn photo_body(&self, image_base64: &str) -> Value {
        json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": PHOTO_SYSTEM_PROMPT},
                {"role": "user", "content": [
                    {"type": "text", "text": PHOTO_USER_PROMPT},
                    {"type": "image_url", "image_url": {
                        "url": format!("data:image/jpeg;base64,{image_base64}"),
                    }},
                ]},
            ],
            "response_format": {"type": "json_object"},
            "max_tokens": PHOTO_MAX_TOKENS,
        })
    }

    /// POST a chat completion and return the first choice's message text.
    async fn complete(&self, body: &Value) -> Result<String, GenerationError> {
        let mut http = self.client.post(self.api_url()).json(body);
        if let Some(key) = &self.config.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| self.map_transport(e))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| self.map_transport(e))?;

        if !status.is_success() {
            return Err(GenerationError::Api {
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        extract_content(&text)
    }

    fn map_transport(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout(self.config.timeout)
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl MealPlanGenerator for OpenAiGenerator {
    fn name(&self) -> String {
        format!("openai:{}", self.config.model)
    }

    async fn generate_plan(
        &self,
        request: &GenerationRequest,
    ) -> Result<CandidatePlan, GenerationError> {
        let content = self.complete(&self.plan_body(request)).await?;
        tracing::debug!(bytes = content.len(), "received meal plan from generator");
        parse_candidate_plan(&content)
    }

    async fn analyze_food_photo(
        &self,
        image_base64: &str,
    ) -> Result<PhotoAnalysis, GenerationError> {
        let content = self.complete(&self.photo_body(image_base64)).await?;
        parse_generated_json(&content)
    }
}

// ---------------------------------------------------------------------------
// Response handling
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Pull the message text out of a chat completion body.
fn extract_content(body: &str) -> Result<String, GenerationError> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("chat completion envelope: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)
}

/// The API's own error message when present, else the start of the body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_owned))
        .unwrap_or_else(|| body.chars().take(ERROR_BODY_LIMIT).collect())
}

#[cfg(test)]
mod tests {
    use nutriplan_db::models::{BudgetLevel, CookingSkill, DietType};

    use super::*;

    fn generator() -> OpenAiGenerator {
        OpenAiGenerator::new(OpenAiConfig {
            base_url: "http://localhost:9/v1/".to_owned(),
            api_key: Some("sk-test".to_owned()),
            ..OpenAiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(
            generator().api_url(),
            "http://localhost:9/v1/chat/completions"
        );
    }

    #[test]
    fn plan_body_requests_json_output() {
        let request = GenerationRequest {
            daily_calories: 2000,
            daily_protein_g: 150,
            daily_carbs_g: 200,
            daily_fat_g: 70,
            diet_type: DietType::Standard,
            allergies: Vec::new(),
            disliked_foods: Vec::new(),
            favorite_cuisines: Vec::new(),
            cooking_skill: CookingSkill::Intermediate,
            max_prep_time_minutes: 45,
            budget_level: BudgetLevel::Moderate,
            servings_per_meal: 1,
            number_of_days: 3,
            meals_per_day: 3,
        };
        let body = generator().plan_body(&request);
        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["response_format"]["type"], "json_object");
        assert_eq!(body["max_tokens"], 16_000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(
            body["messages"][1]["content"]
                .as_str()
                .unwrap()
                .starts_with("Generate a 3-day meal plan")
        );
    }

    #[test]
    fn photo_body_embeds_data_url() {
        let body = generator().photo_body("QUJD");
        let url = &body["messages"][1]["content"][1]["image_url"]["url"];
        assert_eq!(url, "data:image/jpeg;base64,QUJD");
        assert_eq!(body["max_tokens"], 1_000);
    }

    #[test]
    fn extracts_first_choice() {
        let body = r#"{"choices": [{"message": {"role": "assistant", "content": "{\"name\": \"x\"}"}}]}"#;
        assert_eq!(extract_content(body).unwrap(), r#"{"name": "x"}"#);
    }

    #[test]
    fn missing_content_is_empty_response() {
        for body in [
            r#"{"choices": []}"#,
            r#"{"choices": [{"message": {"content": null}}]}"#,
            r#"{"choices": [{"message": {"content": "  "}}]}"#,
        ] {
            assert!(matches!(
                extract_content(body),
                Err(GenerationError::EmptyResponse)
            ));
        }
    }

    #[test]
    fn non_json_envelope_is_malformed() {
        assert!(matches!(
            extract_content("<html>bad gateway</html>"),
            Err(GenerationError::Malformed(_))
        ));
    }

    #[test]
    fn error_message_prefers_api_message() {
        assert_eq!(
            error_message(r#"{"error": {"message": "Incorrect API key", "type": "auth"}}"#),
            "Incorrect API key"
        );
        let long = "x".repeat(2000);
        assert_eq!(error_message(&long).len(), ERROR_BODY_LIMIT);
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        let err = generator().complete(&json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            GenerationError::Transport(_) | GenerationError::Timeout(_)
        ));
    }
}
