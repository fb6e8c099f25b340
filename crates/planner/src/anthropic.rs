use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;

use crate::types::GenerationParams;
use crate::{Planner, PlannerError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicPlanner {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    default_model: String,
}

impl AnthropicPlanner {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .unwrap_or_default(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            default_model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        }
    }

    /// Reads `ANTHROPIC_API_KEY` (and optionally `ANTHROPIC_BASE_URL`/`ANTHROPIC_MODEL`)
    /// from the environment, the way a local CLI tool typically picks up credentials
    /// without a full credential-store layer.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY is not set"))?;
        let base_url = std::env::var("ANTHROPIC_BASE_URL").ok();
        let model = std::env::var("ANTHROPIC_MODEL").ok();
        Ok(Self::new(api_key, base_url, model))
    }
}

#[async_trait]
impl Planner for AnthropicPlanner {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &str, model: &str, params: &GenerationParams) -> Result<String> {
        let model = if model.is_empty() { &self.default_model } else { model };

        let mut body = json!({
            "model": model,
            "max_tokens": params.max_tokens,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if let Some(temp) = params.temperature {
            body["temperature"] = json!(temp);
        }

        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string());
            let body = resp.text().await.unwrap_or_default();
            return Err(
                PlannerError::from_http(status.as_u16(), body, retry_after.as_deref()).into(),
            );
        }

        let data: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| PlannerError::Deserialization(e.to_string()))?;

        let text = data["content"][0]["text"].as_str().unwrap_or("");
        if text.is_empty() {
            return Err(PlannerError::EmptyCompletion.into());
        }
        Ok(text.to_string())
    }
}
