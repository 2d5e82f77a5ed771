//! Default values for configuration

use crate::backend::{BackendDescriptor, Provider};

/// Default number of documents analyzed at once (one per rotation entry)
pub fn default_max_concurrency() -> usize {
    7
}

/// Default analysis call timeout in seconds
pub fn default_analysis_timeout() -> u64 {
    60
}

/// Default per-operation storage timeout in seconds
pub fn default_store_timeout() -> u64 {
    10
}

/// Default sampling temperature for extraction requests
pub fn default_temperature() -> f32 {
    0.1
}

/// Default Groq chat completions endpoint
pub fn default_groq_endpoint() -> String {
    std::env::var("DOCKET_GROQ_ENDPOINT")
        .unwrap_or_else(|_| "https://api.groq.com/openai/v1/chat/completions".to_string())
}

/// Default Mistral chat completions endpoint
pub fn default_mistral_endpoint() -> String {
    std::env::var("DOCKET_MISTRAL_ENDPOINT")
        .unwrap_or_else(|_| "https://api.mistral.ai/v1/chat/completions".to_string())
}

/// Default Codestral chat completions endpoint
pub fn default_codestral_endpoint() -> String {
    std::env::var("DOCKET_CODESTRAL_ENDPOINT")
        .unwrap_or_else(|_| "https://codestral.mistral.ai/v1/chat/completions".to_string())
}

pub fn default_groq_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

pub fn default_mistral_api_key_env() -> String {
    "MISTRAL_API_KEY".to_string()
}

pub fn default_codestral_api_key_env() -> String {
    "CODESTRAL_API_KEY".to_string()
}

/// Default backend rotation: seven workers across three providers
pub fn default_backends() -> Vec<BackendDescriptor> {
    vec![
        BackendDescriptor::new(Provider::Groq, "llama-3.3-70b-versatile", 100_000),
        BackendDescriptor::new(Provider::Groq, "llama-3.1-8b-instant", 100_000),
        BackendDescriptor::new(Provider::Groq, "openai/gpt-oss-20b", 65_000),
        BackendDescriptor::new(Provider::Groq, "moonshotai/kimi-k2-instruct-0905", 200_000),
        BackendDescriptor::new(Provider::Mistral, "mistral-small-latest", 30_000),
        BackendDescriptor::new(Provider::Codestral, "codestral-latest", 32_000),
        BackendDescriptor::new(
            Provider::Groq,
            "meta-llama/llama-4-maverick-17b-128e-instruct",
            100_000,
        ),
    ]
}
