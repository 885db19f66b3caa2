use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    config::Config,
    error::{AppError, AppResult},
};

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEEPSEEK_MODEL: &str = "deepseek-chat";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_MODEL: &str = "gpt-4o-mini";

/// A single JSON-mode chat completion request
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

/// Raw model output plus the model that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: String,
}

/// Chat model asked to answer with a JSON object
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> AppResult<Completion>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Any OpenAI-compatible chat completions endpoint
pub struct OpenAiCompatible {
    http_client: HttpClient,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatible {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http_client: HttpClient::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn deepseek(api_key: &str) -> Self {
        Self::new(DEEPSEEK_BASE_URL, api_key, DEEPSEEK_MODEL)
    }

    pub fn openai(api_key: &str) -> Self {
        Self::new(OPENAI_BASE_URL, api_key, OPENAI_MODEL)
    }
}

#[async_trait::async_trait]
impl LanguageModel for OpenAiCompatible {
    async fn complete(&self, prompt: &Prompt) -> AppResult<Completion> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: prompt.temperature,
            max_tokens: prompt.max_tokens,
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .timeout(prompt.timeout)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "{} returned status {}: {}",
                self.model,
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| AppError::ExternalApi(format!("{} returned no content", self.model)))?;

        Ok(Completion {
            content,
            model: self.model.clone(),
        })
    }
}

/// Tries the primary model and falls back to the secondary on any failure
pub struct FailoverModel {
    primary: Box<dyn LanguageModel>,
    fallback: Option<Box<dyn LanguageModel>>,
}

impl FailoverModel {
    pub fn new(primary: Box<dyn LanguageModel>, fallback: Option<Box<dyn LanguageModel>>) -> Self {
        Self { primary, fallback }
    }

    /// Builds the pair from configured keys; `LLM_PROVIDER` picks the primary
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let deepseek = (!config.deepseek_api_key.is_empty())
            .then(|| Box::new(OpenAiCompatible::deepseek(&config.deepseek_api_key)) as Box<dyn LanguageModel>);
        let openai = (!config.openai_api_key.is_empty())
            .then(|| Box::new(OpenAiCompatible::openai(&config.openai_api_key)) as Box<dyn LanguageModel>);

        let (primary, fallback) = if config.llm_provider.eq_ignore_ascii_case("openai") {
            (openai, deepseek)
        } else {
            (deepseek, openai)
        };

        match (primary, fallback) {
            (Some(primary), fallback) => Ok(Self::new(primary, fallback)),
            (None, Some(only)) => Ok(Self::new(only, None)),
            (None, None) => Err(AppError::Internal(
                "set DEEPSEEK_API_KEY or OPENAI_API_KEY".to_string(),
            )),
        }
    }
}

#[async_trait::async_trait]
impl LanguageModel for FailoverModel {
    async fn complete(&self, prompt: &Prompt) -> AppResult<Completion> {
        let primary_error = match self.primary.complete(prompt).await {
            Ok(completion) => return Ok(completion),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(AppError::ExternalApi(format!(
                "LLM failed and no fallback is configured: {}",
                primary_error
            )));
        };

        tracing::warn!(error = %primary_error, "Primary LLM failed, falling back");
        fallback.complete(prompt).await.map_err(|fallback_error| {
            AppError::ExternalApi(format!(
                "All LLMs failed. Primary: {}, fallback: {}",
                primary_error, fallback_error
            ))
        })
    }
}

/// Strips markdown code fences some models wrap around JSON mode output
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompt() -> Prompt {
        Prompt {
            system: "s".to_string(),
            user: "u".to_string(),
            max_tokens: 10,
            temperature: 0.7,
            timeout: Duration::from_secs(1),
        }
    }

    fn completion(model: &str) -> Completion {
        Completion {
            content: "{}".to_string(),
            model: model.to_string(),
        }
    }

    #[tokio::test]
    async fn test_failover_uses_primary_when_healthy() {
        let mut primary = MockLanguageModel::new();
        primary
            .expect_complete()
            .returning(|_| Ok(completion(DEEPSEEK_MODEL)));
        let mut fallback = MockLanguageModel::new();
        fallback.expect_complete().never();

        let model = FailoverModel::new(Box::new(primary), Some(Box::new(fallback)));
        let result = model.complete(&prompt()).await.unwrap();
        assert_eq!(result.model, DEEPSEEK_MODEL);
    }

    #[tokio::test]
    async fn test_failover_switches_on_error() {
        let mut primary = MockLanguageModel::new();
        primary
            .expect_complete()
            .returning(|_| Err(AppError::ExternalApi("down".to_string())));
        let mut fallback = MockLanguageModel::new();
        fallback
            .expect_complete()
            .times(1)
            .returning(|_| Ok(completion(OPENAI_MODEL)));

        let model = FailoverModel::new(Box::new(primary), Some(Box::new(fallback)));
        let result = model.complete(&prompt()).await.unwrap();
        assert_eq!(result.model, OPENAI_MODEL);
    }

    #[tokio::test]
    async fn test_failover_reports_both_errors() {
        let mut primary = MockLanguageModel::new();
        primary
            .expect_complete()
            .returning(|_| Err(AppError::ExternalApi("primary down".to_string())));
        let mut fallback = MockLanguageModel::new();
        fallback
            .expect_complete()
            .returning(|_| Err(AppError::ExternalApi("fallback down".to_string())));

        let model = FailoverModel::new(Box::new(primary), Some(Box::new(fallback)));
        let err = model.complete(&prompt()).await.unwrap_err().to_string();
        assert!(err.contains("primary down"));
        assert!(err.contains("fallback down"));
    }

    #[test]
    fn test_from_config_requires_a_key() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert!(FailoverModel::from_config(&config).is_err());

        let config: Config = envy::from_iter(vec![
            ("OPENAI_API_KEY".to_string(), "sk-test".to_string()),
        ])
        .unwrap();
        assert!(FailoverModel::from_config(&config).is_ok());
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }
}
