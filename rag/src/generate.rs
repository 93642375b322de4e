use serde::{Deserialize, Serialize};
use tracing::info;

use crate::build_prompt::Message;
use crate::config::{Config, Device};
use crate::error::{RagError, Result};
use crate::http::{HttpClient, HttpError};

/// Causal text generation backend.
///
/// Implementations must decode deterministically so the same prompt yields the
/// same text.
pub trait Generator: Send + Sync {
    fn generate(&self, messages: &[Message], max_new_tokens: usize) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    top_k: u32,
    seed: u32,
    num_predict: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_gpu: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

/// Chat completions served by an Ollama-compatible `/api/chat` endpoint.
pub struct OllamaGenerator {
    http: HttpClient,
    base_url: String,
    model: String,
    device: Device,
}

impl OllamaGenerator {
    pub fn new(
        http: HttpClient,
        base_url: impl Into<String>,
        model: impl Into<String>,
        device: Device,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            device,
        }
    }

    pub fn from_config(cfg: &Config, http: HttpClient) -> Self {
        Self::new(http, cfg.ollama_url.clone(), cfg.chat_model.clone(), cfg.device)
    }

    /// Confirms the backend is reachable and has the chat model installed.
    pub fn ensure_available(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.base_url);
        let tags = self
            .http
            .get_json::<TagsResponse>(&url)
            .map_err(|e| RagError::Model(e.to_string()))?;
        if tags
            .models
            .iter()
            .any(|m| same_model(&m.name, &self.model))
        {
            info!(model = %self.model, device = ?self.device, "generation model ready");
            Ok(())
        } else {
            Err(RagError::Model(format!(
                "model '{}' is not installed on {}",
                self.model, self.base_url
            )))
        }
    }

    fn options(&self, max_new_tokens: usize) -> ChatOptions {
        ChatOptions {
            temperature: 0.0,
            top_k: 1,
            seed: 0,
            num_predict: max_new_tokens,
            num_gpu: match self.device {
                Device::Cpu => Some(0),
                Device::Auto | Device::Gpu => None,
            },
        }
    }
}

impl Generator for OllamaGenerator {
    fn generate(&self, messages: &[Message], max_new_tokens: usize) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let req = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: self.options(max_new_tokens),
        };
        let res = self
            .http
            .post_json::<ChatResponse, _>(&url, &req)
            .map_err(|e| inference_error(e, &self.http))?;
        Ok(res.message.and_then(|m| m.content).unwrap_or_default())
    }
}

fn inference_error(err: HttpError, http: &HttpClient) -> RagError {
    if err.is_timeout() {
        RagError::InferenceTimeout(http.timeout())
    } else {
        RagError::Inference(err.to_string())
    }
}

// Ollama reports untagged models with an implicit `:latest`.
fn same_model(installed: &str, wanted: &str) -> bool {
    let strip = |name: &str| name.strip_suffix(":latest").unwrap_or(name).to_string();
    strip(installed) == strip(wanted)
}
