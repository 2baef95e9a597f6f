//! Pipeline orchestration shared by the HTTP handlers.
//!
//! Generation: prompt -> model (with retries) -> validator -> bank upserts -> quiz.
//! Grading: stored quiz -> transcription + scoring -> stored answers and grade.

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::bank::BankWrite;
use crate::domain::{
  AnswerSubmission, AssessmentSample, ExerciseQuiz, GenerationRequest, Material, MaterialBatch,
  MaterialRequest, QuizBatch, QuizQuestion, MAX_ASSESSMENT_SAMPLE,
};
use crate::error::PipelineError;
use crate::grading::GradeOutcome;
use crate::state::AppState;
use crate::store::QuizFilter;

/// How many past question texts are offered to the model as "do not repeat".
const HISTORY_LIMIT: usize = 20;

#[derive(Clone, Debug)]
pub struct QuizGeneration {
  pub quiz: ExerciseQuiz,
  pub newly_banked: usize,
  pub already_banked: usize,
}

/// Most recent graded answers of a user, newest first.
#[instrument(level = "debug", skip(state))]
pub async fn recent_assessment(state: &AppState, user_id: &str) -> Result<Vec<AssessmentSample>, PipelineError> {
  let limit = state.config.generation.assessment_sample_size.min(MAX_ASSESSMENT_SAMPLE);
  let filter = QuizFilter { user_id: Some(user_id.to_string()), graded_only: true };
  let quizzes = state.exercises.find(&filter).await?;

  let mut samples: Vec<(chrono::DateTime<Utc>, AssessmentSample)> = quizzes
    .iter()
    .flat_map(|quiz| {
      quiz.answers.iter().filter_map(move |ans| {
        let q = quiz.question_by_id(&ans.question_id)?;
        Some((
          ans.time_answered,
          AssessmentSample {
            method: q.item.method,
            question: q.item.question.value().to_string(),
            key: q.item.key.clone(),
            answer: ans.transcribed_text.clone(),
            similarity_point: ans.similarity_point,
          },
        ))
      })
    })
    .collect();
  samples.sort_by(|a, b| b.0.cmp(&a.0));
  Ok(samples.into_iter().take(limit).map(|(_, s)| s).collect())
}

async fn recent_history(state: &AppState, user_id: &str) -> Result<Vec<String>, PipelineError> {
  let filter = QuizFilter { user_id: Some(user_id.to_string()), graded_only: false };
  let quizzes = state.exercises.find(&filter).await?;
  Ok(
    quizzes
      .iter()
      .flat_map(|q| q.questions.iter().map(|qq| qq.item.question.value().to_string()))
      .take(HISTORY_LIMIT)
      .collect(),
  )
}

#[instrument(level = "info", skip(state, req), fields(%user_id, quantity = req.quantity, method = ?req.method))]
pub async fn generate_quiz(
  state: &AppState,
  user_id: &str,
  mut req: GenerationRequest,
) -> Result<QuizGeneration, PipelineError> {
  if req.history.is_empty() {
    req.history = recent_history(state, user_id).await?;
  }
  if req.assessment_sample.is_empty() {
    req = req.with_assessment(recent_assessment(state, user_id).await?);
  }

  let prompt = state.prompts.quiz_prompt(&req);
  let batch: QuizBatch = state.generator.generate_default(&prompt).await?;
  let items = state.validator.validate(batch.into_items(), &req);
  if items.is_empty() {
    warn!(target: "generation", %user_id, "Every generated item was rejected");
    return Err(PipelineError::ValidationEmpty { requested: req.quantity });
  }

  // Items are independent after validation: bank them concurrently.
  let upserts = join_all(items.iter().map(|item| state.bank.upsert_if_absent(item))).await;

  let mut questions = Vec::with_capacity(items.len());
  let (mut newly_banked, mut already_banked) = (0, 0);
  for (item, upsert) in items.into_iter().zip(upserts) {
    let upsert = upsert?;
    match upsert.write {
      BankWrite::Inserted => newly_banked += 1,
      BankWrite::AlreadyPresent => already_banked += 1,
    }
    questions.push(QuizQuestion { id: Uuid::new_v4().to_string(), bank_hash: upsert.hash, item });
  }

  let quiz = ExerciseQuiz {
    id: Uuid::new_v4().to_string(),
    user_id: user_id.to_string(),
    created_at: Utc::now(),
    questions,
    answers: vec![],
    grade: None,
  };
  state.exercises.save(quiz.clone()).await?;
  info!(target: "generation", quiz_id = %quiz.id, questions = quiz.questions.len(), newly_banked, already_banked, "Quiz generated");
  Ok(QuizGeneration { quiz, newly_banked, already_banked })
}

#[instrument(level = "info", skip(state, req), fields(quantity = req.quantity, method = ?req.method))]
pub async fn generate_materials(state: &AppState, req: MaterialRequest) -> Result<Vec<Material>, PipelineError> {
  let prompt = state.prompts.material_prompt(&req);
  let batch: MaterialBatch = state.generator.generate_default(&prompt).await?;
  let materials = state.validator.validate_materials(batch.into_items(), &req);
  if materials.is_empty() {
    return Err(PipelineError::ValidationEmpty { requested: req.quantity });
  }
  info!(target: "generation", count = materials.len(), "Materials generated");
  Ok(materials)
}

#[instrument(level = "info", skip(state, submissions), fields(%quiz_id, submitted = submissions.len()))]
pub async fn grade_quiz(
  state: &AppState,
  quiz_id: &str,
  submissions: Vec<AnswerSubmission>,
) -> Result<GradeOutcome, PipelineError> {
  let mut quiz = state
    .exercises
    .find_by_id(quiz_id)
    .await?
    .ok_or_else(|| PipelineError::NotFound { what: "quiz", id: quiz_id.to_string() })?;

  let outcome = state.grading.grade(&quiz, submissions).await;
  quiz.answers = outcome.records.clone();
  quiz.grade = Some(outcome.result);
  state.exercises.save(quiz).await?;
  Ok(outcome)
}
