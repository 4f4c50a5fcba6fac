//! OpenAI-compatible chat completion client for the text collaborators.
//!
//! Uses the blocking reqwest client; async callers must run it off the runtime threads.

use std::error::Error;
use std::fmt;
use std::time::Duration;

use kernel_core::CollaboratorError;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

pub const ENV_LLM_API_KEY: &str = "CITYPULSE_LLM_API_KEY";
pub const ENV_LLM_BASE_URL: &str = "CITYPULSE_LLM_BASE_URL";
pub const ENV_LLM_MODEL: &str = "CITYPULSE_LLM_MODEL";
pub const ENV_LLM_TIMEOUT_MS: &str = "CITYPULSE_LLM_TIMEOUT_MS";

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.deepseek.com";
pub const DEFAULT_LLM_MODEL: &str = "deepseek-chat";
pub const DEFAULT_LLM_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, PartialEq, Eq)]
pub struct LlmSettings {
    pub model: String,
    pub base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
}

// The key must never reach logs.
impl fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmSettings")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl LlmSettings {
    pub fn from_env() -> Result<Self, LlmConfigError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with<F>(mut getter: F) -> Result<Self, LlmConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let api_key = required_env(&mut getter, ENV_LLM_API_KEY)?;
        let base_url = optional_env(&mut getter, ENV_LLM_BASE_URL)
            .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string());
        let model =
            optional_env(&mut getter, ENV_LLM_MODEL).unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string());
        let timeout_ms = match optional_env(&mut getter, ENV_LLM_TIMEOUT_MS) {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(parsed) if parsed > 0 => parsed,
                _ => return Err(LlmConfigError::InvalidTimeout { value }),
            },
            None => DEFAULT_LLM_TIMEOUT_MS,
        };

        Ok(Self {
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_ms,
        })
    }
}

fn required_env<F>(getter: &mut F, key: &'static str) -> Result<String, LlmConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let value = getter(key).ok_or(LlmConfigError::MissingEnv { key })?;
    if value.trim().is_empty() {
        return Err(LlmConfigError::EmptyEnv { key });
    }
    Ok(value.trim().to_string())
}

fn optional_env<F>(getter: &mut F, key: &str) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    getter(key).filter(|value| !value.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmConfigError {
    MissingEnv { key: &'static str },
    EmptyEnv { key: &'static str },
    InvalidTimeout { value: String },
}

impl fmt::Display for LlmConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmConfigError::MissingEnv { key } => write!(f, "missing env variable: {key}"),
            LlmConfigError::EmptyEnv { key } => write!(f, "empty env variable: {key}"),
            LlmConfigError::InvalidTimeout { value } => {
                write!(f, "invalid timeout value: {value}")
            }
        }
    }
}

impl Error for LlmConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmMessage {
    pub role: LlmRole,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: LlmRole::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LlmCompletionRequest {
    pub messages: Vec<LlmMessage>,
    pub temperature: Option<f32>,
    pub json_output: bool,
}

/// "Send a conversation, get back one text completion."
pub trait LlmCompletionClient {
    fn complete(&self, request: &LlmCompletionRequest) -> Result<String, LlmClientError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmClientError {
    BuildClient { message: String },
    Http { message: String },
    HttpStatus { code: u16, message: String },
    DecodeResponse { message: String },
    EmptyChoice,
}

impl fmt::Display for LlmClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmClientError::BuildClient { message } => write!(f, "client build failed: {message}"),
            LlmClientError::Http { message } => write!(f, "http request failed: {message}"),
            LlmClientError::HttpStatus { code, message } => {
                write!(f, "http status {code}: {message}")
            }
            LlmClientError::DecodeResponse { message } => {
                write!(f, "decode response failed: {message}")
            }
            LlmClientError::EmptyChoice => write!(f, "empty completion choice"),
        }
    }
}

impl Error for LlmClientError {}

impl From<LlmClientError> for CollaboratorError {
    fn from(err: LlmClientError) -> Self {
        match err {
            LlmClientError::BuildClient { .. }
            | LlmClientError::Http { .. }
            | LlmClientError::HttpStatus { .. } => CollaboratorError::Unavailable(err.to_string()),
            LlmClientError::DecodeResponse { .. } | LlmClientError::EmptyChoice => {
                CollaboratorError::Malformed(err.to_string())
            }
        }
    }
}

pub struct OpenAiChatCompletionClient {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl fmt::Debug for OpenAiChatCompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChatCompletionClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiChatCompletionClient {
    pub fn from_settings(settings: &LlmSettings) -> Result<Self, LlmClientError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|err| LlmClientError::BuildClient {
                message: err.to_string(),
            })?;
        Ok(Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            client,
        })
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [LlmMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn build_payload<'a>(model: &'a str, request: &'a LlmCompletionRequest) -> ChatCompletionRequest<'a> {
    ChatCompletionRequest {
        model,
        messages: &request.messages,
        temperature: request.temperature,
        response_format: request.json_output.then_some(ResponseFormat {
            format_type: "json_object",
        }),
    }
}

impl LlmCompletionClient for OpenAiChatCompletionClient {
    fn complete(&self, request: &LlmCompletionRequest) -> Result<String, LlmClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let payload = build_payload(&self.model, request);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .map_err(|err| LlmClientError::Http {
                message: err.to_string(),
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let message = response.text().unwrap_or_else(|_| "<no body>".to_string());
            return Err(LlmClientError::HttpStatus {
                code: status.as_u16(),
                message,
            });
        }

        let response: ChatCompletionResponse =
            response
                .json()
                .map_err(|err| LlmClientError::DecodeResponse {
                    message: err.to_string(),
                })?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmClientError::EmptyChoice)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn getter(pairs: &[(&str, &str)]) -> impl FnMut(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn settings_require_api_key() {
        assert_eq!(
            LlmSettings::from_env_with(getter(&[])),
            Err(LlmConfigError::MissingEnv {
                key: ENV_LLM_API_KEY
            })
        );
        assert_eq!(
            LlmSettings::from_env_with(getter(&[(ENV_LLM_API_KEY, "  ")])),
            Err(LlmConfigError::EmptyEnv {
                key: ENV_LLM_API_KEY
            })
        );
    }

    #[test]
    fn settings_fill_defaults_and_trim_base_url() {
        let settings = LlmSettings::from_env_with(getter(&[
            (ENV_LLM_API_KEY, "sk-test"),
            (ENV_LLM_BASE_URL, "http://localhost:9000/v1/"),
        ]))
        .expect("valid settings");
        assert_eq!(settings.base_url, "http://localhost:9000/v1");
        assert_eq!(settings.model, DEFAULT_LLM_MODEL);
        assert_eq!(settings.timeout_ms, DEFAULT_LLM_TIMEOUT_MS);
    }

    #[test]
    fn settings_reject_bad_timeout() {
        let result = LlmSettings::from_env_with(getter(&[
            (ENV_LLM_API_KEY, "sk-test"),
            (ENV_LLM_TIMEOUT_MS, "soon"),
        ]));
        assert_eq!(
            result,
            Err(LlmConfigError::InvalidTimeout {
                value: "soon".to_string()
            })
        );
    }

    #[test]
    fn debug_output_redacts_key() {
        let settings = LlmSettings::from_env_with(getter(&[(ENV_LLM_API_KEY, "sk-secret-123")]))
            .expect("valid settings");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("sk-secret-123"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn payload_requests_json_object_only_when_asked() {
        let request = LlmCompletionRequest {
            messages: vec![LlmMessage::system("be brief"), LlmMessage::user("hi")],
            temperature: Some(0.1),
            json_output: true,
        };
        let encoded = serde_json::to_value(build_payload("deepseek-chat", &request))
            .expect("serialize payload");
        assert_eq!(encoded["response_format"]["type"], "json_object");
        assert_eq!(encoded["messages"][0]["role"], "system");

        let plain = LlmCompletionRequest {
            json_output: false,
            temperature: None,
            ..request
        };
        let encoded = serde_json::to_value(build_payload("deepseek-chat", &plain))
            .expect("serialize payload");
        assert!(encoded.get("response_format").is_none());
        assert!(encoded.get("temperature").is_none());
    }

    #[test]
    fn transport_failure_maps_to_unavailable() {
        let settings = LlmSettings {
            model: DEFAULT_LLM_MODEL.to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            api_key: "sk-test".to_string(),
            timeout_ms: 500,
        };
        let client = OpenAiChatCompletionClient::from_settings(&settings).expect("client builds");
        let request = LlmCompletionRequest {
            messages: vec![LlmMessage::user("hello")],
            temperature: None,
            json_output: false,
        };
        let err = client.complete(&request).expect_err("nothing listens on port 9");
        assert!(matches!(
            CollaboratorError::from(err),
            CollaboratorError::Unavailable(_)
        ));
    }
}
