//! Chat model abstraction and the Gemini backend.
//!
//! The server only talks to [`ChatModel`]; [`create_model`] picks the
//! implementation from `[chat].provider`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::ChatConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// A text generation backend.
///
/// `history` holds the prior turns of the session, oldest first, and does
/// not include `message`.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String>;
}

/// Builds the model named by `config.provider`.
///
/// For `gemini` the API key is read from the environment variable named by
/// `config.api_key_env`; a missing key is an error.
pub fn create_model(config: &ChatConfig) -> Result<Arc<dyn ChatModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledModel)),
        "gemini" => {
            let api_key = std::env::var(&config.api_key_env)
                .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
            Ok(Arc::new(GeminiClient::new(config, api_key)?))
        }
        other => bail!("Unknown chat provider: {}", other),
    }
}

/// Always fails. Used when `[chat].provider = "disabled"`.
pub struct DisabledModel;

#[async_trait]
impl ChatModel for DisabledModel {
    async fn generate(&self, _: &str, _: &[ChatTurn], _: &str) -> Result<String> {
        bail!("Chat provider is disabled")
    }
}

/// Client for the Gemini `generateContent` REST endpoint.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: &ChatConfig, api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

/// Request body: system instruction plus the alternating user/model turns.
pub fn request_body(system_prompt: &str, history: &[ChatTurn], message: &str) -> serde_json::Value {
    let contents: Vec<serde_json::Value> = history
        .iter()
        .chain(std::iter::once(&ChatTurn::user(message)))
        .map(|turn| {
            serde_json::json!({
                "role": turn.role,
                "parts": [{ "text": turn.text }],
            })
        })
        .collect();

    let mut body = serde_json::json!({ "contents": contents });
    if !system_prompt.is_empty() {
        body["systemInstruction"] = serde_json::json!({
            "parts": [{ "text": system_prompt }],
        });
    }
    body
}

/// Extracts the reply text from a `generateContent` response.
pub fn parse_response(json: &serde_json::Value) -> Result<String> {
    if let Some(reason) = json
        .pointer("/promptFeedback/blockReason")
        .and_then(|r| r.as_str())
    {
        bail!("Prompt blocked by Gemini: {}", reason);
    }

    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: no candidates"))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    if text.is_empty() {
        bail!("Invalid Gemini response: empty reply");
    }
    Ok(text)
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn generate(
        &self,
        system_prompt: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String> {
        let body = request_body(system_prompt, history, message);
        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_response(&json)
    }
}
