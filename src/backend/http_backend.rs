use super::{BackendDescriptor, Provider};
use crate::config::ProvidersConfig;
use crate::error::{Error, Result};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    model: &'a str,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
struct ProviderEndpoint {
    url: Url,
    api_key: Option<String>,
}

/// Client for OpenAI-compatible chat completion endpoints.
///
/// No timeout or retry is applied here; callers own both.
pub struct ChatClient {
    client: Client,
    endpoints: HashMap<Provider, ProviderEndpoint>,
    temperature: f32,
}

impl ChatClient {
    pub fn new(providers: &ProvidersConfig, temperature: f32) -> Result<Self> {
        let mut endpoints = HashMap::new();
        for provider in [Provider::Groq, Provider::Mistral, Provider::Codestral] {
            let config = providers.get(provider);
            let url = Url::parse(&config.endpoint).map_err(|e| {
                Error::Config(format!("Invalid {} endpoint: {}", provider, e))
            })?;
            let api_key = std::env::var(&config.api_key_env)
                .ok()
                .filter(|key| !key.is_empty());
            if api_key.is_none() {
                debug!(
                    "{} is not set; {} requests will be sent without credentials",
                    config.api_key_env, provider
                );
            }
            endpoints.insert(provider, ProviderEndpoint { url, api_key });
        }

        Ok(Self {
            client: Client::builder().build()?,
            endpoints,
            temperature,
        })
    }

    /// Send one system + user exchange and return the assistant's message text
    pub async fn complete(
        &self,
        backend: &BackendDescriptor,
        system: &str,
        user: &str,
    ) -> Result<String> {
        let endpoint = self.endpoints.get(&backend.provider).ok_or_else(|| {
            Error::Config(format!("No endpoint configured for {}", backend.provider))
        })?;

        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            model: &backend.model,
            response_format: ResponseFormat {
                kind: "json_object",
            },
            temperature: self.temperature,
        };

        let mut builder = self.client.post(endpoint.url.clone()).json(&request);
        if let Some(key) = &endpoint.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            Error::Backend(format!(
                "{} Error ({}): {}",
                backend.provider, backend.model, e
            ))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            Error::Backend(format!(
                "{} Error ({}): {}",
                backend.provider, backend.model, e
            ))
        })?;

        if !status.is_success() {
            let message = backend_error_message(status, &body);
            warn!(
                "{} returned {} for model {}: {}",
                backend.provider, status, backend.model, message
            );
            return Err(Error::Backend(format!(
                "{} Error ({}): {}",
                backend.provider, backend.model, message
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("invalid completion envelope: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| Error::Parse("completion contained no message content".to_string()))
    }
}

/// Best message available from an error response: `error.message`, then a
/// top-level `message`, then the HTTP status text.
fn backend_error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| status.to_string())
        })
}
