//! Routing of submitted answers to the OCR or speech-to-text service.
//!
//! `image/*` payloads go to OCR as-is (data URL included); `audio/*` payloads lose
//! their data-URL prefix and go to speech-to-text. Both services also return their
//! own similarity judgment against the expected key.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::TranscriptionConfig;
use crate::error::{EndpointError, PipelineError};
use crate::util::{data_url_media_type, strip_data_url_prefix, trunc_for_log};

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TranscriptionReply {
  #[serde(default)]
  pub text: String,
  #[serde(default)]
  pub similarity: Option<f64>,
}

#[async_trait]
pub trait TranscriptionEndpoint: Send + Sync {
  async fn ocr(&self, image: &str, correct: &str) -> Result<TranscriptionReply, EndpointError>;
  async fn speech_to_text(&self, audio: &str, correct: &str) -> Result<TranscriptionReply, EndpointError>;
}

#[derive(Serialize)]
struct OcrRequest<'a> {
  image: &'a str,
  correct: &'a str,
}

#[derive(Serialize)]
struct SttRequest<'a> {
  audio: &'a str,
  correct: &'a str,
}

#[derive(Clone)]
pub struct HttpTranscriptionEndpoint {
  client: reqwest::Client,
  ocr_url: String,
  stt_url: String,
}

impl HttpTranscriptionEndpoint {
  pub fn new(client: reqwest::Client, cfg: &TranscriptionConfig) -> Self {
    let base = cfg.base_url.trim_end_matches('/');
    Self {
      client,
      ocr_url: format!("{}{}", base, cfg.ocr_path),
      stt_url: format!("{}{}", base, cfg.stt_path),
    }
  }

  async fn post<B: Serialize + Sync>(&self, url: &str, body: &B) -> Result<TranscriptionReply, EndpointError> {
    let res = self.client.post(url)
      .header(USER_AGENT, "latihan-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .json(body).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(EndpointError::Status { status, body: trunc_for_log(&body, 200) });
    }
    Ok(res.json::<TranscriptionReply>().await?)
  }
}

#[async_trait]
impl TranscriptionEndpoint for HttpTranscriptionEndpoint {
  async fn ocr(&self, image: &str, correct: &str) -> Result<TranscriptionReply, EndpointError> {
    self.post(&self.ocr_url, &OcrRequest { image, correct }).await
  }

  async fn speech_to_text(&self, audio: &str, correct: &str) -> Result<TranscriptionReply, EndpointError> {
    self.post(&self.stt_url, &SttRequest { audio, correct }).await
  }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Transcription {
  pub text: String,
  /// Service similarity in [0, 100], when the service sent one.
  pub similarity_hint: Option<f64>,
}

/// Explicit media type if given, otherwise the one carried by a data URL.
pub fn resolve_media_type(explicit: Option<&str>, payload: &str) -> Option<String> {
  explicit
    .map(str::trim)
    .filter(|m| !m.is_empty())
    .or_else(|| data_url_media_type(payload))
    .map(|m| m.to_ascii_lowercase())
}

/// Character-set check only: padding and line wrapping are left for the service to judge.
fn looks_like_base64(raw: &str) -> bool {
  let mut any = false;
  for c in raw.chars() {
    match c {
      'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' | '-' | '_' | '=' => any = true,
      c if c.is_ascii_whitespace() => {}
      _ => return false,
    }
  }
  any
}

#[derive(Clone)]
pub struct TranscriptionDispatcher {
  endpoint: Arc<dyn TranscriptionEndpoint>,
}

impl TranscriptionDispatcher {
  pub fn new(endpoint: Arc<dyn TranscriptionEndpoint>) -> Self { Self { endpoint } }

  pub fn from_config(client: reqwest::Client, cfg: &TranscriptionConfig) -> Self {
    Self::new(Arc::new(HttpTranscriptionEndpoint::new(client, cfg)))
  }

  #[instrument(target = "grading", level = "info", skip(self, payload, expected_key), fields(payload_len = payload.len()))]
  pub async fn transcribe(
    &self,
    media_type: &str,
    payload: &str,
    expected_key: &str,
  ) -> Result<Transcription, PipelineError> {
    let reply = if media_type.starts_with("image/") {
      self.endpoint.ocr(payload, expected_key).await
    } else if media_type.starts_with("audio/") {
      let raw = strip_data_url_prefix(payload);
      if !looks_like_base64(raw) {
        warn!(target: "grading", %media_type, payload_len = raw.len(), "Audio payload is not base64 text");
        return Err(PipelineError::TranscriptionService("audio payload is not base64 text".into()));
      }
      self.endpoint.speech_to_text(raw, expected_key).await
    } else {
      return Err(PipelineError::UnsupportedMedia { media_type: media_type.to_string() });
    };

    let reply = reply.map_err(|e| {
      warn!(target: "grading", %media_type, error = %e, "Transcription call failed");
      PipelineError::TranscriptionService(e.to_string())
    })?;

    debug!(target: "grading", text = %trunc_for_log(&reply.text, 60), similarity = ?reply.similarity, "Transcribed answer");
    Ok(Transcription {
      text: reply.text,
      similarity_hint: reply.similarity.filter(|s| s.is_finite()).map(|s| s.clamp(0.0, 100.0)),
    })
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use std::sync::Mutex;

  /// Records every call; replies come from a closure over (media, payload, key).
  pub(crate) struct FakeTranscriber {
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub reply: Box<dyn Fn(&str, &str) -> Result<TranscriptionReply, EndpointError> + Send + Sync>,
  }

  impl FakeTranscriber {
    pub(crate) fn new(
      reply: impl Fn(&str, &str) -> Result<TranscriptionReply, EndpointError> + Send + Sync + 'static,
    ) -> Self {
      Self { calls: Mutex::new(vec![]), reply: Box::new(reply) }
    }
  }

  #[async_trait]
  impl TranscriptionEndpoint for FakeTranscriber {
    async fn ocr(&self, image: &str, correct: &str) -> Result<TranscriptionReply, EndpointError> {
      self.calls.lock().unwrap().push(("ocr".into(), image.into(), correct.into()));
      (self.reply)(image, correct)
    }

    async fn speech_to_text(&self, audio: &str, correct: &str) -> Result<TranscriptionReply, EndpointError> {
      self.calls.lock().unwrap().push(("stt".into(), audio.into(), correct.into()));
      (self.reply)(audio, correct)
    }
  }

  fn echo() -> Arc<FakeTranscriber> {
    Arc::new(FakeTranscriber::new(|_, correct| {
      Ok(TranscriptionReply { text: correct.to_string(), similarity: Some(100.0) })
    }))
  }

  #[tokio::test]
  async fn image_goes_to_ocr_with_full_payload() {
    let fake = echo();
    let d = TranscriptionDispatcher::new(fake.clone());
    let out = d.transcribe("image/png", "data:image/png;base64,iVBOR", "kucing").await.unwrap();
    assert_eq!(out.text, "kucing");
    let calls = fake.calls.lock().unwrap();
    assert_eq!(calls[0], ("ocr".into(), "data:image/png;base64,iVBOR".into(), "kucing".into()));
  }

  #[tokio::test]
  async fn audio_goes_to_stt_without_prefix() {
    let fake = echo();
    let d = TranscriptionDispatcher::new(fake.clone());
    d.transcribe("audio/webm", "data:audio/webm;base64,AAAA", "buku").await.unwrap();
    let calls = fake.calls.lock().unwrap();
    assert_eq!(calls[0], ("stt".into(), "AAAA".into(), "buku".into()));
  }

  #[tokio::test]
  async fn wrapped_or_unpadded_audio_reaches_stt() {
    let fake = echo();
    let d = TranscriptionDispatcher::new(fake.clone());
    d.transcribe("audio/webm", "data:audio/webm;base64,AAAA\nAAAA", "buku").await.unwrap();
    d.transcribe("audio/webm", "data:audio/webm;base64,AAA", "buku").await.unwrap();
    let calls = fake.calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1, "AAAA\nAAAA");
    assert_eq!(calls[1].1, "AAA");
  }

  #[tokio::test]
  async fn other_media_is_unsupported() {
    let fake = echo();
    let d = TranscriptionDispatcher::new(fake.clone());
    let err = d.transcribe("text/plain", "hello", "hello").await.unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedMedia { ref media_type } if media_type == "text/plain"));
    assert!(fake.calls.lock().unwrap().is_empty());
  }

  #[tokio::test]
  async fn non_base64_audio_and_failed_calls_are_service_errors() {
    let fake = echo();
    let d = TranscriptionDispatcher::new(fake.clone());
    let err = d.transcribe("audio/wav", "data:audio/wav;base64,@@not base64@@", "x").await.unwrap_err();
    assert!(matches!(err, PipelineError::TranscriptionService(_)));
    let err = d.transcribe("audio/wav", "data:audio/wav;base64,", "x").await.unwrap_err();
    assert!(matches!(err, PipelineError::TranscriptionService(_)));
    assert!(fake.calls.lock().unwrap().is_empty());

    let failing = Arc::new(FakeTranscriber::new(|_, _| {
      Err(EndpointError::Status { status: 500, body: "boom".into() })
    }));
    let d = TranscriptionDispatcher::new(failing);
    let err = d.transcribe("image/jpeg", "abc", "x").await.unwrap_err();
    assert!(matches!(err, PipelineError::TranscriptionService(_)));
  }

  #[tokio::test]
  async fn similarity_hint_is_clamped() {
    let fake = Arc::new(FakeTranscriber::new(|_, _| {
      Ok(TranscriptionReply { text: "x".into(), similarity: Some(140.0) })
    }));
    let d = TranscriptionDispatcher::new(fake);
    let out = d.transcribe("image/png", "abc", "x").await.unwrap();
    assert_eq!(out.similarity_hint, Some(100.0));
  }

  #[test]
  fn media_type_resolution() {
    assert_eq!(resolve_media_type(Some("Image/PNG"), "xyz").as_deref(), Some("image/png"));
    assert_eq!(resolve_media_type(None, "data:audio/ogg;base64,AA").as_deref(), Some("audio/ogg"));
    assert_eq!(resolve_media_type(Some(" "), "data:audio/ogg;base64,AA").as_deref(), Some("audio/ogg"));
    assert_eq!(resolve_media_type(None, "AA"), None);
  }

  #[tokio::test]
  async fn http_endpoints_receive_expected_bodies() {
    let mut server = mockito::Server::new_async().await;
    let ocr = server
      .mock("POST", "/ocr")
      .match_body(mockito::Matcher::Json(serde_json::json!({"image": "data:image/png;base64,AA", "correct": "bola"})))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"text": "bola", "similarity": 92.5}"#)
      .create_async()
      .await;
    let stt = server
      .mock("POST", "/speech-to-text")
      .match_body(mockito::Matcher::Json(serde_json::json!({"audio": "AAAA", "correct": "bola"})))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"text": "bolah"}"#)
      .create_async()
      .await;

    let cfg = TranscriptionConfig { base_url: server.url(), ..TranscriptionConfig::default() };
    let d = TranscriptionDispatcher::from_config(reqwest::Client::new(), &cfg);

    let img = d.transcribe("image/png", "data:image/png;base64,AA", "bola").await.unwrap();
    assert_eq!(img, Transcription { text: "bola".into(), similarity_hint: Some(92.5) });
    let aud = d.transcribe("audio/mpeg", "data:audio/mpeg;base64,AAAA", "bola").await.unwrap();
    assert_eq!(aud, Transcription { text: "bolah".into(), similarity_hint: None });

    ocr.assert_async().await;
    stt.assert_async().await;
  }
}
