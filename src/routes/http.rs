//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;

use axum::{
  extract::{Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument};

use crate::domain::{GenerationRequest, MaterialRequest};
use crate::error::PipelineError;
use crate::logic::{generate_materials, generate_quiz, grade_quiz};
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for PipelineError {
  fn into_response(self) -> Response {
    let (status, kind) = match &self {
      PipelineError::GenerationExhausted { .. } => (StatusCode::SERVICE_UNAVAILABLE, "generation_exhausted"),
      PipelineError::ValidationEmpty { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "validation_empty"),
      PipelineError::UnsupportedMedia { .. } => (StatusCode::BAD_REQUEST, "unsupported_media"),
      PipelineError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
      PipelineError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
      PipelineError::TranscriptionService(_) => (StatusCode::BAD_GATEWAY, "transcription_service"),
    };
    (status, Json(ErrorOut { kind, message: self.to_string() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state, body), fields(user_id = %body.user_id, quantity = body.quantity, method = body.method))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerateQuizIn>,
) -> Result<Json<QuizOut>, PipelineError> {
  let mut req = GenerationRequest::new(body.quantity, body.method)?
    .with_history(body.history)
    .with_whitelist(body.asset_whitelist);
  if let Some(t) = body.time_of_day {
    req = req.with_time_of_day(t);
  }
  let generation = generate_quiz(&state, &body.user_id, req).await?;
  info!(target: "latihan_backend", quiz_id = %generation.quiz.id, questions = generation.quiz.questions.len(), "HTTP quiz generated");
  Ok(Json(quiz_out(&generation)))
}

#[instrument(level = "info", skip(state, body), fields(quantity = body.quantity, method = body.method))]
pub async fn http_post_material(
  State(state): State<Arc<AppState>>,
  Json(body): Json<MaterialIn>,
) -> Result<Json<MaterialsOut>, PipelineError> {
  let mut req = MaterialRequest::new(body.quantity, body.method)?;
  req.history = body.history;
  req.asset_whitelist = body.asset_whitelist;
  let materials = generate_materials(&state, req).await?;
  Ok(Json(MaterialsOut { materials }))
}

#[instrument(level = "info", skip(state, body), fields(%quiz_id, answers = body.answers.len()))]
pub async fn http_post_answers(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<String>,
  Json(body): Json<GradeIn>,
) -> Result<Json<GradeOut>, PipelineError> {
  let submissions = body.answers.into_iter().map(Into::into).collect();
  let outcome = grade_quiz(&state, &quiz_id, submissions).await?;
  info!(target: "latihan_backend", %quiz_id, score = outcome.result.score, "HTTP submission graded");
  Ok(Json(grade_out(&outcome)))
}
