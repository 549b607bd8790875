//! Client for the Hugging Face text-generation inference API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use super::{GenerationParams, InferenceError, InferenceProvider};
use crate::config::InferenceConfig;

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: Parameters,
}

#[derive(Serialize)]
struct Parameters {
    max_new_tokens: u32,
    temperature: f64,
    do_sample: bool,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct Generated {
    generated_text: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Batch(Vec<Generated>),
    Single(Generated),
    Error { error: String },
}

pub struct HfInferenceClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
    model: String,
    timeout_secs: u64,
}

impl std::fmt::Debug for HfInferenceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HfInferenceClient")
            .field("endpoint", &self.endpoint)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl HfInferenceClient {
    /// Build a client from config. Fails if no token is configured.
    pub fn from_config(config: &InferenceConfig) -> anyhow::Result<Self> {
        let token = config.require_token()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoint = format!(
            "{}/{}",
            config.api_base.trim_end_matches('/'),
            config.model
        );

        Ok(Self {
            client,
            endpoint,
            token,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }

    fn classify(&self, err: reqwest::Error) -> InferenceError {
        if err.is_timeout() {
            InferenceError::Timeout(self.timeout_secs)
        } else {
            InferenceError::Transport(err)
        }
    }
}

#[async_trait]
impl InferenceProvider for HfInferenceClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, InferenceError> {
        debug!(
            model = %self.model,
            prompt_chars = prompt.len(),
            max_new_tokens = params.max_new_tokens,
            "calling inference endpoint"
        );

        let body = GenerateRequest {
            inputs: prompt,
            parameters: Parameters {
                max_new_tokens: params.max_new_tokens,
                temperature: params.temperature,
                do_sample: params.do_sample,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            error!(status = status.as_u16(), body = %text, "inference endpoint error");
            return Err(InferenceError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| InferenceError::Malformed(format!("{e}: {text}")))?;

        match parsed {
            GenerateResponse::Batch(mut items) if !items.is_empty() => {
                Ok(items.swap_remove(0).generated_text.trim().to_string())
            }
            GenerateResponse::Batch(_) => {
                Err(InferenceError::Malformed("empty generation list".into()))
            }
            GenerateResponse::Single(item) => Ok(item.generated_text.trim().to_string()),
            GenerateResponse::Error { error } => Err(InferenceError::Malformed(error)),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> InferenceConfig {
        InferenceConfig {
            api_base: server.uri(),
            model: "org/test-model".into(),
            token: Some("hf_test".into()),
            timeout_secs: 5,
            ..InferenceConfig::default()
        }
    }

    fn params() -> GenerationParams {
        GenerationParams::chat(&InferenceConfig::default())
    }

    #[test]
    fn requires_token() {
        let config = InferenceConfig::default();
        assert!(HfInferenceClient::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn generates_and_trims_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/org/test-model"))
            .and(header("Authorization", "Bearer hf_test"))
            .and(body_partial_json(serde_json::json!({
                "inputs": "User: hi\nAssistant:",
                "parameters": {
                    "max_new_tokens": 500,
                    "do_sample": true,
                    "return_full_text": false
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "generated_text": "  Hello there.  \n" }
            ])))
            .mount(&server)
            .await;

        let client = HfInferenceClient::from_config(&config_for(&server)).unwrap();
        let text = client.generate("User: hi\nAssistant:", &params()).await.unwrap();
        assert_eq!(text, "Hello there.");
        assert_eq!(client.model(), "org/test-model");
    }

    #[tokio::test]
    async fn accepts_single_object_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "generated_text": "ok" })),
            )
            .mount(&server)
            .await;

        let client = HfInferenceClient::from_config(&config_for(&server)).unwrap();
        assert_eq!(client.generate("x", &params()).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(503)
                    .set_body_json(serde_json::json!({ "error": "Model is loading" })),
            )
            .mount(&server)
            .await;

        let client = HfInferenceClient::from_config(&config_for(&server)).unwrap();
        match client.generate("x", &params()).await {
            Err(InferenceError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert!(body.contains("Model is loading"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = HfInferenceClient::from_config(&config_for(&server)).unwrap();
        assert!(matches!(
            client.generate("x", &params()).await,
            Err(InferenceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([{ "generated_text": "late" }]))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.timeout_secs = 1;
        let client = HfInferenceClient::from_config(&config).unwrap();
        assert!(matches!(
            client.generate("x", &params()).await,
            Err(InferenceError::Timeout(1))
        ));
    }
}
