//! Generation backend abstraction.
//!
//! The query client only cares about "send one input, get the provider JSON
//! back"; everything else (caching, credential rotation, retry,
//! post-processing) lives in [`crate::emoji::client`]. Keeping the seam here
//! lets tests swap in a scripted backend without any network I/O.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;

use crate::errors::BotError;

/// One round-trip to the remote text-generation endpoint.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Send `input` with the given bearer token and return the raw provider
    /// response JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the body is not JSON.
    async fn generate(&self, input: &str, token: &str) -> Result<Value, BotError>;
}

/// HuggingFace serverless inference backend.
pub struct HuggingFaceBackend {
    http: Client,
    api_url: String,
}

impl HuggingFaceBackend {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_url: String) -> Result<Self, BotError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BotError::HttpError(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { http, api_url })
    }
}

#[async_trait]
impl GenerationBackend for HuggingFaceBackend {
    async fn generate(&self, input: &str, token: &str) -> Result<Value, BotError> {
        // `wait_for_model` blocks instead of erroring while the serverless
        // model is cold-starting. Decoding is deterministic: short output,
        // no sampling.
        let payload = json!({
            "inputs": input,
            "options": {"wait_for_model": true},
            "parameters": {
                "max_new_tokens": 5,
                "do_sample": false,
            },
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BotError::HttpError(format!("Generation request failed: {e}")))?;

        response
            .json::<Value>()
            .await
            .map_err(|e| BotError::BackendError(format!("Non-JSON generation response: {e}")))
    }
}
