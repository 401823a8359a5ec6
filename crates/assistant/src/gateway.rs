//! The hosted chat-completion gateway.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::selection::{select_model, ModelEntry};

/// Reply used when no provider credential is configured.
pub const OFFLINE_NOTICE: &str =
    "The assistant is offline: no API credential is configured on the server.";

const INVALID_CREDENTIAL_NOTICE: &str =
    "The assistant could not authenticate with its provider: the configured API credential is invalid.";

/// Fixed domain-restricting instruction sent with every exchange.
const SYSTEM_INSTRUCTION: &str = "You are a medical assistant specialized in heart health. \
     Answer heart-health questions clearly and helpfully. \
     If a question is not about heart health, refuse tersely.";

/// Gateway configuration. Generation parameters are tunables, not a
/// contract with the provider.
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub preferred_models: Vec<String>,
    pub fallback_model: String,
    pub temperature: f64,
    pub top_p: f64,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            preferred_models: vec![
                "gemini-1.5-flash".to_string(),
                "gemini-1.5-pro".to_string(),
                "gemini-pro".to_string(),
            ],
            fallback_model: "models/gemini-pro".to_string(),
            temperature: 0.4,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 512,
        }
    }
}

#[derive(Error, Debug)]
enum AskError {
    #[error("provider rejected the credential")]
    Unauthorized,
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("provider returned an unusable response: {0}")]
    Malformed(String),
}

/// Stateless per-call gateway with one piece of process-wide state: the
/// resolved model identifier, initialized at most once on first real use.
/// A concurrent first-call race is benign; both resolutions converge on
/// the same value.
pub struct Gateway {
    config: AssistantConfig,
    client: reqwest::Client,
    resolved_model: OnceCell<String>,
}

impl Gateway {
    pub fn new(config: AssistantConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            resolved_model: OnceCell::new(),
        }
    }

    /// Whether a provider credential is present.
    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// Forward one message. Never errors outward: failures come back as
    /// explanatory fallback strings.
    pub async fn ask(&self, message: &str) -> String {
        let Some(api_key) = self.config.api_key.clone() else {
            return OFFLINE_NOTICE.to_string();
        };

        match self.exchange(&api_key, message).await {
            Ok(reply) => reply,
            Err(err) => {
                warn!("assistant exchange failed: {err}");
                fallback_message(&err)
            }
        }
    }

    async fn exchange(&self, api_key: &str, message: &str) -> Result<String, AskError> {
        let model = self
            .resolved_model
            .get_or_try_init(|| self.resolve_model(api_key))
            .await?
            .clone();

        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: SYSTEM_INSTRUCTION.to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: message.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                max_output_tokens: self.config.max_output_tokens,
            },
        };

        let url = format!("{}/{}:generateContent", self.config.base_url, model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| AskError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AskError::Unauthorized);
        }
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AskError::Transport(format!("HTTP {status}: {detail}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| AskError::Malformed(e.to_string()))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| AskError::Malformed("response contained no text candidate".to_string()))
    }

    /// Resolve the model identifier from the provider's listing.
    /// Runs at most once per process; the result is cached.
    async fn resolve_model(&self, api_key: &str) -> Result<String, AskError> {
        let url = format!("{}/models", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("key", api_key)])
            .send()
            .await
            .map_err(|e| AskError::Transport(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AskError::Unauthorized);
        }
        if !status.is_success() {
            debug!("model listing failed with HTTP {status}; using fallback model");
            return Ok(self.config.fallback_model.clone());
        }

        let listing: ModelListing = response
            .json()
            .await
            .map_err(|e| AskError::Malformed(e.to_string()))?;

        let model = select_model(
            &listing.models,
            &self.config.preferred_models,
            &self.config.fallback_model,
        );
        info!("assistant model resolved to {model}");
        Ok(model)
    }
}

fn fallback_message(err: &AskError) -> String {
    match err {
        AskError::Unauthorized => INVALID_CREDENTIAL_NOTICE.to_string(),
        other => format!("The assistant is unavailable right now ({other})."),
    }
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f64,
    top_p: f64,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> Gateway {
        Gateway::new(AssistantConfig::default())
    }

    #[tokio::test]
    async fn unconfigured_gateway_returns_offline_notice() {
        assert_eq!(unconfigured().ask("").await, OFFLINE_NOTICE);
        assert_eq!(
            unconfigured().ask("what is a healthy resting heart rate?").await,
            OFFLINE_NOTICE
        );
    }

    #[tokio::test]
    async fn concurrent_unconfigured_asks_all_return_offline_notice() {
        let gateway = std::sync::Arc::new(unconfigured());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gateway = gateway.clone();
                tokio::spawn(async move { gateway.ask("hello").await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), OFFLINE_NOTICE);
        }
    }

    #[test]
    fn unauthorized_maps_to_invalid_credential_notice() {
        let msg = fallback_message(&AskError::Unauthorized);
        assert_eq!(msg, INVALID_CREDENTIAL_NOTICE);
    }

    #[test]
    fn transport_failure_maps_to_generic_notice_with_detail() {
        let msg = fallback_message(&AskError::Transport("connection refused".to_string()));
        assert!(msg.contains("connection refused"));
        assert_ne!(msg, INVALID_CREDENTIAL_NOTICE);
    }

    #[test]
    fn generate_request_serializes_to_provider_shape() {
        let request = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: "instruction".to_string(),
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: "question".to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.4,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 512,
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("systemInstruction").is_some());
        assert!(value.get("generationConfig").is_some());
        assert_eq!(value["contents"][0]["role"], "user");
        assert_eq!(value["generationConfig"]["maxOutputTokens"], 512);
    }

    #[test]
    fn generate_response_extracts_first_candidate_text() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"stay hydrated"}]}}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text);
        assert_eq!(text.as_deref(), Some("stay hydrated"));
    }
}
