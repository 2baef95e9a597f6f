//! Client for the generative model endpoint with a bounded retry loop.
//!
//! Request body: `{model, prompt, stream: false}`; the reply carries the raw text in
//! `response`. Each attempt's text is sanitized and parsed; a transport error or an
//! unparseable reply both move on to the next attempt immediately (no backoff).
//! No deadline is set on the HTTP client: a hung call blocks its caller.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::config::ModelConfig;
use crate::error::{EndpointError, PipelineError};
use crate::sanitize::{parse, sanitize};
use crate::util::trunc_for_log;

/// One raw completion call. Implemented over HTTP in production and faked in tests.
#[async_trait]
pub trait ModelEndpoint: Send + Sync {
  async fn complete(&self, model: &str, prompt: &str) -> Result<String, EndpointError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
  model: &'a str,
  prompt: &'a str,
  stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
  #[serde(default)]
  response: String,
}

#[derive(Clone)]
pub struct HttpModelEndpoint {
  client: reqwest::Client,
  base_url: String,
}

impl HttpModelEndpoint {
  pub fn new(client: reqwest::Client, base_url: &str) -> Self {
    Self { client, base_url: base_url.trim_end_matches('/').to_string() }
  }
}

#[async_trait]
impl ModelEndpoint for HttpModelEndpoint {
  #[instrument(level = "debug", skip(self, prompt), fields(%model, prompt_len = prompt.len()))]
  async fn complete(&self, model: &str, prompt: &str) -> Result<String, EndpointError> {
    let url = format!("{}/api/generate", self.base_url);
    let req = GenerateRequest { model, prompt, stream: false };

    let res = self.client.post(&url)
      .header(USER_AGENT, "latihan-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(EndpointError::Status { status, body: trunc_for_log(&body, 200) });
    }

    let body: GenerateResponse = res.json().await?;
    Ok(body.response)
  }
}

#[derive(Clone)]
pub struct GenerationClient {
  endpoint: Arc<dyn ModelEndpoint>,
  model_id: String,
  max_attempts: u32,
}

impl GenerationClient {
  pub fn new(endpoint: Arc<dyn ModelEndpoint>, model_id: &str, max_attempts: u32) -> Self {
    Self { endpoint, model_id: model_id.to_string(), max_attempts }
  }

  pub fn from_config(client: reqwest::Client, cfg: &ModelConfig) -> Self {
    Self::new(Arc::new(HttpModelEndpoint::new(client, &cfg.base_url)), &cfg.model_id, cfg.max_attempts)
  }

  pub fn model_id(&self) -> &str { &self.model_id }
  pub fn max_attempts(&self) -> u32 { self.max_attempts }

  /// Generate with the configured model and attempt budget.
  pub async fn generate_default<T: DeserializeOwned>(&self, prompt: &str) -> Result<T, PipelineError> {
    self.generate(prompt, &self.model_id, self.max_attempts).await
  }

  /// Call the model up to `max_attempts` times; the first reply that parses as `T` wins.
  #[instrument(target = "generation", level = "info", skip(self, prompt), fields(prompt_len = prompt.len()))]
  pub async fn generate<T: DeserializeOwned>(
    &self,
    prompt: &str,
    model_id: &str,
    max_attempts: u32,
  ) -> Result<T, PipelineError> {
    for attempt in 1..=max_attempts {
      let start = std::time::Instant::now();
      let raw = match self.endpoint.complete(model_id, prompt).await {
        Ok(raw) => raw,
        Err(e) => {
          warn!(target: "generation", attempt, elapsed = ?start.elapsed(), error = %e, "Model call failed; retrying");
          continue;
        }
      };

      let clean = sanitize(&raw);
      match parse::<T>(&clean) {
        Some(value) => {
          info!(target: "generation", attempt, elapsed = ?start.elapsed(), response_len = raw.len(), "Model output parsed");
          return Ok(value);
        }
        None => {
          warn!(target: "generation", attempt, response_len = raw.len(), "Model output did not parse; retrying");
          debug!(target: "generation", attempt, preview = %trunc_for_log(&clean, 160), "Unparseable model output");
        }
      }
    }
    Err(PipelineError::GenerationExhausted { attempts: max_attempts })
  }
}
