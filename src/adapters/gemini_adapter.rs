//! Gemini `generateContent` client implementing AdvisoryPort.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::domain::advisory::{build_prompt, parse_verdict, AdvisoryVerdict, TechnicalContext};
use crate::domain::error::UnumError;
use crate::ports::advisory_port::AdvisoryPort;

const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiAdapter {
    client: reqwest::blocking::Client,
    model: String,
    api_key: Option<String>,
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

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

impl GeminiAdapter {
    /// A missing key is not an error here; every call then fails and is
    /// degraded by `consult`.
    pub fn new(model: &str, api_key: Option<String>) -> Result<Self, UnumError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| UnumError::Advisory {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            model: model.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    /// Reads the key from the environment variable `key_env`.
    pub fn from_env(model: &str, key_env: &str) -> Result<Self, UnumError> {
        Self::new(model, std::env::var(key_env).ok())
    }
}

impl AdvisoryPort for GeminiAdapter {
    fn analyze(&self, context: &TechnicalContext) -> Result<AdvisoryVerdict, UnumError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| UnumError::Advisory {
            reason: "API key missing".to_string(),
        })?;

        let url = format!("{BASE_URL}/{}:generateContent", self.model);
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(context)? }] }]
        });

        debug!(model = %self.model, symbol = %context.symbol, "requesting advisory");
        let resp = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&body)
            .send()
            .map_err(|e| UnumError::Advisory {
                reason: format!("request failed: {e}"),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(UnumError::Advisory {
                reason: format!("HTTP {status} from {}", self.model),
            });
        }

        let parsed: GenerateResponse = resp.json().map_err(|e| UnumError::Advisory {
            reason: format!("malformed response: {e}"),
        })?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .ok_or_else(|| UnumError::Advisory {
                reason: "response has no candidates".to_string(),
            })?;

        parse_verdict(&text)
    }
}
