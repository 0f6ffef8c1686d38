// SPDX-FileCopyrightText: 2026 Doppel Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text-generation client for OpenAI-compatible `/chat/completions` endpoints.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use doppel_config::model::GeneratorConfig;
use doppel_core::{AdapterType, DoppelError, PluginAdapter, TextGenerator};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Calls a chat-completions API once per prompt. Never retries; the
/// orchestrator owns the generation budget.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    completions_url: String,
    model: String,
    max_tokens: u32,
    api_key: Option<SecretString>,
}

impl std::fmt::Debug for HttpTextGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTextGenerator")
            .field("completions_url", &self.completions_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl HttpTextGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self, DoppelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| DoppelError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            completions_url: format!(
                "{}/chat/completions",
                config.endpoint.trim_end_matches('/')
            ),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            api_key: config.api_key.clone().map(SecretString::from),
        })
    }
}

#[async_trait]
impl PluginAdapter for HttpTextGenerator {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Generator
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, DoppelError> {
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
        };

        let mut request = self.client.post(&self.completions_url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose_secret());
        }

        let response = request.send().await.map_err(|e| DoppelError::Generation {
            message: format!("completion request failed: {e}"),
            source: Some(Box::new(e)),
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| DoppelError::Generation {
            message: format!("failed to read completion body: {e}"),
            source: Some(Box::new(e)),
        })?;
        debug!(status = %status, model = %self.model, "completion response received");

        if !status.is_success() {
            let detail = serde_json::from_str::<ApiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(DoppelError::generation(format!(
                "completion API returned {status}: {detail}"
            )));
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| DoppelError::Generation {
                message: format!("failed to parse completion response: {e}"),
                source: Some(Box::new(e)),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DoppelError::generation("completion contained no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn generator(server: &MockServer, api_key: Option<&str>) -> HttpTextGenerator {
        HttpTextGenerator::new(&GeneratorConfig {
            endpoint: format!("{}/v1/", server.uri()),
            model: "test-model".into(),
            api_key: api_key.map(str::to_string),
            ..GeneratorConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "See you at 6"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = generator(&server, Some("sk-test"))
            .generate("Reply:")
            .await
            .unwrap();
        assert_eq!(text, "See you at 6");
    }

    #[tokio::test]
    async fn api_error_message_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "rate limited", "type": "requests"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = generator(&server, None).generate("Reply:").await.unwrap_err();
        assert!(matches!(err, DoppelError::Generation { .. }));
        assert!(err.to_string().contains("rate limited"), "got: {err}");
    }

    #[tokio::test]
    async fn no_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        assert!(generator(&server, None).generate("Reply:").await.is_err());
    }

    #[test]
    fn debug_output_hides_the_key() {
        let generator = HttpTextGenerator::new(&GeneratorConfig {
            api_key: Some("sk-very-secret".into()),
            ..GeneratorConfig::default()
        })
        .unwrap();
        assert!(!format!("{generator:?}").contains("sk-very-secret"));
    }
}
