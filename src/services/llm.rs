use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::config::settings::LlmConfig;
use crate::utils::ApiError;

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Tries the primary model, then each fallback in order. Returns the
    /// first successful completion; fails only if every candidate errors.
    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: usize) -> Result<String, ApiError>;
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessageRequest<'a>>,
    temperature: f32,
    max_tokens: usize,
}

pub struct HttpLlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    fallback_models: Vec<String>,
}

impl HttpLlmClient {
    pub fn new(cfg: &LlmConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_seconds))
            .build()
            .expect("reqwest client builds");

        Self {
            client,
            base_url: cfg.base_url.clone(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            fallback_models: cfg.fallback_models.clone(),
        }
    }

    async fn call_model(
        &self,
        model: &str,
        prompt: &str,
        temperature: f32,
        max_tokens: usize,
    ) -> anyhow::Result<String> {
        let body = ChatCompletionRequest {
            model,
            messages: vec![ChatMessageRequest {
                role: "user",
                content: prompt,
            }],
            temperature,
            max_tokens,
        };

        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);

        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?.error_for_status()?.json::<ChatCompletionResponse>().await?;

        let content = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("empty completion response"))?;

        Ok(content)
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn generate(&self, prompt: &str, temperature: f32, max_tokens: usize) -> Result<String, ApiError> {
        let candidates = std::iter::once(self.model.as_str()).chain(self.fallback_models.iter().map(String::as_str));

        let mut last_err = None;
        for model in candidates {
            match self.call_model(model, prompt, temperature, max_tokens).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model, error = %e, "llm model call failed, trying next candidate");
                    last_err = Some(e);
                }
            }
        }

        Err(ApiError::Upstream(format!(
            "all llm models exhausted: {}",
            last_err.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}
