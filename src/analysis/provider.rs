//! Chat model backends.
//!
//! [`ChatModel`] is the seam between question answering and the model vendor.
//! [`HttpChatModel`] speaks two wire protocols:
//!
//! - OpenAI-compatible chat completions (`POST {base}/chat/completions`), used for OpenAI and DeepSeek
//! - the Ollama chat API (`POST {host}/api/chat`, non-streaming), used for local models

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};

use super::prompts::ChatPrompt;

pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_API_BASE: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// OpenAI model names that are swapped for a supported equivalent.
const OPENAI_MODEL_MAPPING: &[(&str, &str)] = &[("gpt-4o", "gpt-4"), ("gpt-4o-mini", "gpt-3.5-turbo")];

/// Sends a prompt to a model and returns the reply text.
pub trait ChatModel {
    fn complete(&self, prompt: &ChatPrompt) -> AnalysisResult<String>;
}

impl<M: ChatModel + ?Sized> ChatModel for Box<M> {
    fn complete(&self, prompt: &ChatPrompt) -> AnalysisResult<String> {
        (**self).complete(prompt)
    }
}

/// Settings for a hosted, key-authenticated API.
#[derive(Clone, PartialEq)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub base_url: String,
}

impl std::fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSettings")
            .field("api_key_set", &self.api_key.is_some())
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Settings for a local Ollama server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub model: String,
    pub host: String,
}

/// Which model backend to use, with its settings.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderConfig {
    OpenAi(ApiSettings),
    DeepSeek(ApiSettings),
    Local(LocalSettings),
}

impl ProviderConfig {
    /// Short vendor name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::OpenAi(_) => "openai",
            ProviderConfig::DeepSeek(_) => "deepseek",
            ProviderConfig::Local(_) => "ollama",
        }
    }

    /// The model name actually sent on the wire.
    pub fn resolved_model(&self) -> String {
        match self {
            ProviderConfig::OpenAi(s) => remap_openai_model(&s.model)
                .map(str::to_owned)
                .unwrap_or_else(|| s.model.clone()),
            ProviderConfig::DeepSeek(s) => s.model.clone(),
            ProviderConfig::Local(s) => s.model.clone(),
        }
    }
}

/// Supported replacement for an OpenAI model name, if it needs one.
pub fn remap_openai_model(model: &str) -> Option<&'static str> {
    OPENAI_MODEL_MAPPING
        .iter()
        .find(|(from, _)| *from == model)
        .map(|(_, to)| *to)
}

#[derive(Debug, Clone, PartialEq)]
enum Endpoint {
    ChatCompletions {
        url: String,
        api_key: String,
        temperature: f32,
    },
    Ollama {
        url: String,
    },
}

/// Blocking HTTP chat client. One request per call, no retries.
#[derive(Debug, Clone)]
pub struct HttpChatModel {
    client: Client,
    endpoint: Endpoint,
    model: String,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatCompletionsRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    temperature: f32,
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatCompletionsChoice>,
}

#[derive(Deserialize)]
struct ChatCompletionsChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

impl HttpChatModel {
    /// Build a client for `config`.
    ///
    /// Hosted providers require an API key; its absence is reported here, before any request.
    pub fn from_config(config: &ProviderConfig) -> AnalysisResult<Self> {
        let model = config.resolved_model();
        let endpoint = match config {
            ProviderConfig::OpenAi(s) => {
                if model != s.model {
                    tracing::warn!(
                        requested = %s.model,
                        using = %model,
                        "model not supported; using replacement"
                    );
                }
                chat_completions_endpoint(s, "OPENAI_API_KEY")?
            }
            ProviderConfig::DeepSeek(s) => chat_completions_endpoint(s, "DEEPSEEK_API_KEY")?,
            ProviderConfig::Local(s) => Endpoint::Ollama {
                url: format!("{}/api/chat", s.host.trim_end_matches('/')),
            },
        };

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        tracing::debug!(provider = config.name(), %model, "chat model configured");
        Ok(Self {
            client,
            endpoint,
            model,
        })
    }

    /// Model name sent with each request.
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, prompt: &ChatPrompt) -> AnalysisResult<serde_json::Value> {
        let messages = [
            WireMessage {
                role: "system",
                content: &prompt.system,
            },
            WireMessage {
                role: "user",
                content: &prompt.user,
            },
        ];
        let body = match &self.endpoint {
            Endpoint::ChatCompletions { temperature, .. } => serde_json::to_value(ChatCompletionsRequest {
                model: &self.model,
                messages,
                temperature: *temperature,
            }),
            Endpoint::Ollama { .. } => serde_json::to_value(OllamaChatRequest {
                model: &self.model,
                messages,
                stream: false,
            }),
        };
        body.map_err(|e| AnalysisError::BadResponse(format!("could not encode request: {e}")))
    }
}

fn chat_completions_endpoint(settings: &ApiSettings, key_name: &str) -> AnalysisResult<Endpoint> {
    let api_key = settings
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AnalysisError::MissingCredential(key_name.to_string()))?;
    Ok(Endpoint::ChatCompletions {
        url: format!("{}/chat/completions", settings.base_url.trim_end_matches('/')),
        api_key,
        temperature: settings.temperature,
    })
}

impl ChatModel for HttpChatModel {
    fn complete(&self, prompt: &ChatPrompt) -> AnalysisResult<String> {
        let body = self.request_body(prompt)?;
        let request = match &self.endpoint {
            Endpoint::ChatCompletions { url, api_key, .. } => {
                self.client.post(url).bearer_auth(api_key).json(&body)
            }
            Endpoint::Ollama { url } => self.client.post(url).json(&body),
        };

        let response = request.send()?;
        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(AnalysisError::BadResponse(format!(
                "HTTP {status}: {}",
                error_message(&text)
            )));
        }

        match &self.endpoint {
            Endpoint::ChatCompletions { .. } => parse_chat_completions(&text),
            Endpoint::Ollama { .. } => parse_ollama(&text),
        }
    }
}

/// Extract the reply from an OpenAI-compatible chat-completions response body.
pub fn parse_chat_completions(body: &str) -> AnalysisResult<String> {
    let parsed: ChatCompletionsResponse =
        serde_json::from_str(body).map_err(|e| AnalysisError::BadResponse(e.to_string()))?;
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| AnalysisError::BadResponse("response has no message content".to_string()))
}

/// Extract the reply from an Ollama chat response body.
pub fn parse_ollama(body: &str) -> AnalysisResult<String> {
    let parsed: OllamaChatResponse =
        serde_json::from_str(body).map_err(|e| AnalysisError::BadResponse(e.to_string()))?;
    parsed
        .message
        .content
        .ok_or_else(|| AnalysisError::BadResponse("response has no message content".to_string()))
}

fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope {
            error: ErrorBody::Detailed { message } | ErrorBody::Plain(message),
        }) => message,
        Err(_) => body.chars().take(500).collect(),
    }
}
