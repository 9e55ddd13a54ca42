use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;

use super::{CompletionClient, CompletionError};
use crate::logging::{debug, info, obj, v_num, v_str, Domain};

/// Chat-completions client for OpenAI-compatible endpoints (the Hugging Face
/// router, vLLM, Ollama's OpenAI mode).
pub struct OpenAiCompatible {
    client: Client,
    base: String,
    model: String,
    api_key: String,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatible {
    pub fn new(base: String, model: String, api_key: String) -> Self {
        Self {
            // no client-side timeout; the call runs until the server answers
            client: Client::new(),
            base: base.trim_end_matches('/').to_string(),
            model,
            api_key,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base)
    }
}

fn first_choice_text(body: &str) -> Result<(String, Option<String>), CompletionError> {
    let resp: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;
    let choice = resp.choices.into_iter().next().ok_or(CompletionError::EmptyChoices)?;
    Ok((choice.message.content.unwrap_or_default(), choice.finish_reason))
}

#[async_trait]
impl CompletionClient for OpenAiCompatible {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
        };
        debug(
            Domain::Llm,
            "request",
            obj(&[
                ("model", v_str(&self.model)),
                ("max_tokens", json!(max_tokens)),
                ("prompt_chars", json!(prompt.len())),
            ]),
        );

        let started = Instant::now();
        let resp = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let (text, finish_reason) = first_choice_text(&body)?;
        info(
            Domain::Llm,
            "response",
            obj(&[
                ("model", v_str(&self.model)),
                ("chars", json!(text.len())),
                ("finish_reason", json!(finish_reason)),
                ("elapsed_ms", v_num(started.elapsed().as_secs_f64() * 1000.0)),
            ]),
        );
        Ok(text)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let c = OpenAiCompatible::new("https://router.huggingface.co/v1/".into(), "m".into(), "k".into());
        assert_eq!(c.endpoint(), "https://router.huggingface.co/v1/chat/completions");
    }

    #[test]
    fn test_request_body_shape() {
        let req = ChatRequest {
            model: "meta-llama/Llama-3.3-70B-Instruct",
            messages: vec![ChatMessage { role: "user", content: "hello" }],
            max_tokens: 2000,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["max_tokens"], 2000);
    }

    #[test]
    fn test_first_choice_text() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Fall: 2, 3"},"finish_reason":"stop"},{"message":{"content":"other"}}]}"#;
        let (text, reason) = first_choice_text(body).unwrap();
        assert_eq!(text, "Fall: 2, 3");
        assert_eq!(reason.as_deref(), Some("stop"));
    }

    #[test]
    fn test_missing_choices_and_garbage() {
        assert!(matches!(first_choice_text(r#"{"choices":[]}"#), Err(CompletionError::EmptyChoices)));
        assert!(matches!(first_choice_text("<html>"), Err(CompletionError::InvalidResponse(_))));
    }
}
