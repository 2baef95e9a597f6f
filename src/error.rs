//! Error kinds surfaced by the generation and grading pipeline.
//!
//! Every failure leaving the pipeline is one of these; nothing is reported as an
//! opaque "internal error". An upsert against existing content is not an error
//! (see `bank::BankWrite::AlreadyPresent`).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
  /// Every model call failed or produced output that would not parse.
  #[error("generation failed after {attempts} attempt(s), please try again")]
  GenerationExhausted { attempts: u32 },

  /// The validator filtered out every generated item.
  #[error("no generated item passed validation ({requested} requested)")]
  ValidationEmpty { requested: usize },

  /// Submitted answer is neither `image/*` nor `audio/*`.
  #[error("unsupported media type '{media_type}'")]
  UnsupportedMedia { media_type: String },

  /// The OCR or speech-to-text service could not produce a transcription.
  #[error("transcription service error: {0}")]
  TranscriptionService(String),

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  #[error("{what} '{id}' not found")]
  NotFound { what: &'static str, id: String },
}

/// Transport-level failure of a single call to an external endpoint.
/// Never leaves the clients: the retry loop and the grading pipeline convert it.
#[derive(Debug, Error)]
pub enum EndpointError {
  #[error("request failed: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("HTTP {status}: {body}")]
  Status { status: u16, body: String },
}
