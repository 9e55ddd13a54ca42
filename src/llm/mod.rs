use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::logging::{info, obj, v_str, Domain};

mod openai;

pub use openai::OpenAiCompatible;

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("network error: {0}")]
    Network(String),
    #[error("API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("response carried no completion choices")]
    EmptyChoices,
    #[error("no API key configured; set HF_API_KEY or LLM_API_KEY")]
    MissingCredentials,
}

/// Prompt in, free text out. Implementations return the text of the first
/// completion choice and nothing else.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CompletionError>;

    fn model(&self) -> &str;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClientKind {
    OpenAiCompatible,
    Null,
}

impl ClientKind {
    pub fn from_config(cfg: &Config) -> Self {
        if cfg.has_llm_credentials() {
            ClientKind::OpenAiCompatible
        } else {
            ClientKind::Null
        }
    }

    pub fn build(self, cfg: &Config) -> Arc<dyn CompletionClient> {
        match self {
            ClientKind::OpenAiCompatible => {
                info(
                    Domain::Llm,
                    "client",
                    obj(&[("type", v_str("openai_compatible")), ("base", v_str(&cfg.llm_base)), ("model", v_str(&cfg.llm_model))]),
                );
                Arc::new(OpenAiCompatible::new(
                    cfg.llm_base.clone(),
                    cfg.llm_model.clone(),
                    cfg.llm_api_key.clone().unwrap_or_default(),
                ))
            }
            ClientKind::Null => {
                info(Domain::Llm, "client", obj(&[("type", v_str("null")), ("status", v_str("stub"))]));
                Arc::new(NullClient)
            }
        }
    }
}

/// Stand-in used when no credentials are configured; every call fails.
pub struct NullClient;

#[async_trait]
impl CompletionClient for NullClient {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, CompletionError> {
        Err(CompletionError::MissingCredentials)
    }

    fn model(&self) -> &str {
        "null"
    }
}

#[derive(Debug, Clone)]
enum Script {
    Text(String),
    Fail(String),
}

/// Replays a fixed response for every call and records what was asked.
///
/// Used to re-parse a saved model response offline and as the test double
/// for generator tests.
pub struct ScriptedClient {
    script: Script,
    calls: AtomicUsize,
    last_max_tokens: AtomicU32,
    last_prompt: Mutex<Option<String>>,
}

impl ScriptedClient {
    pub fn replying(text: impl Into<String>) -> Self {
        Self::with_script(Script::Text(text.into()))
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(message.into()))
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
            last_max_tokens: AtomicU32::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_max_tokens(&self) -> u32 {
        self.last_max_tokens.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|p| p.clone())
    }
}

#[async_trait]
impl CompletionClient for ScriptedClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_max_tokens.store(max_tokens, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
        match &self.script {
            Script::Text(text) => Ok(text.clone()),
            Script::Fail(msg) => Err(CompletionError::Network(msg.clone())),
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_credentials() {
        let cfg = Config::default();
        assert_eq!(ClientKind::from_config(&cfg), ClientKind::Null);
        let cfg = Config {
            llm_api_key: Some("hf_x".to_string()),
            ..Config::default()
        };
        assert_eq!(ClientKind::from_config(&cfg), ClientKind::OpenAiCompatible);
    }

    #[tokio::test]
    async fn test_null_client_fails() {
        let err = NullClient.complete("hi", 10).await.unwrap_err();
        assert!(matches!(err, CompletionError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_scripted_client_records_calls() {
        let client = ScriptedClient::replying("Fall: 1, 2");
        let text = client.complete("prompt", 42).await.unwrap();
        assert_eq!(text, "Fall: 1, 2");
        assert_eq!(client.calls(), 1);
        assert_eq!(client.last_max_tokens(), 42);
        assert_eq!(client.last_prompt().as_deref(), Some("prompt"));
    }
}
