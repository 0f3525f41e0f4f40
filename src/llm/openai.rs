//! OpenAI-compatible chat completions backend

use super::{NarrativeError, NarrativeGenerator};
use crate::config::NarrativeConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are an aviation maintenance engineer writing turbofan engine \
health reports. Be precise, use plain text, and never invent sensor values.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
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

/// Client for any server speaking the `/v1/chat/completions` protocol.
#[derive(Clone)]
pub struct OpenAiCompatibleGenerator {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f64,
}

impl OpenAiCompatibleGenerator {
    /// Build from `[narrative]`. The API key is read from the environment
    /// variable named by `api_key_env`; a missing key is allowed for local servers.
    pub fn from_config(config: &NarrativeConfig) -> Result<Self, NarrativeError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| NarrativeError::Unavailable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl NarrativeGenerator for OpenAiCompatibleGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| NarrativeError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NarrativeError::Transport(format!("server returned status {status}")));
        }
        if !status.is_success() {
            return Err(NarrativeError::Rejected(format!("server returned status {status}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| NarrativeError::Transport(format!("malformed response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!(chars = content.len(), model = %self.model, "Narrative response received");
        if content.trim().is_empty() {
            return Err(NarrativeError::Empty);
        }
        Ok(content)
    }

    fn backend_name(&self) -> &'static str {
        "openai-compatible"
    }
}
