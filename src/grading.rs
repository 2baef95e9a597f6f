//! Grading of a quiz submission.
//!
//! Each submitted answer is transcribed and scored independently (concurrently),
//! then the quiz grade is folded over the recorded scores. The denominator is the
//! number of questions in the quiz, so unanswered questions count as zero.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::domain::{AnswerRecord, AnswerSubmission, ExerciseQuiz, GradeResult, QuizQuestion};
use crate::error::PipelineError;
use crate::similarity;
use crate::transcribe::{resolve_media_type, TranscriptionDispatcher};

#[derive(Clone, Debug, Serialize)]
pub struct SkippedAnswer {
  pub question_id: String,
  pub reason: String,
}

#[derive(Clone, Debug)]
pub struct GradeOutcome {
  pub result: GradeResult,
  /// Full answer list for the quiz after this submission (at most one per question).
  pub records: Vec<AnswerRecord>,
  pub skipped: Vec<SkippedAnswer>,
}

enum AnswerOutcome {
  Recorded(AnswerRecord),
  Skipped(SkippedAnswer),
}

#[derive(Clone)]
pub struct GradingPipeline {
  dispatcher: TranscriptionDispatcher,
}

impl GradingPipeline {
  pub fn new(dispatcher: TranscriptionDispatcher) -> Self { Self { dispatcher } }

  #[instrument(target = "grading", level = "info", skip(self, quiz, submissions), fields(quiz_id = %quiz.id, questions = quiz.questions.len(), submitted = submissions.len()))]
  pub async fn grade(&self, quiz: &ExerciseQuiz, submissions: Vec<AnswerSubmission>) -> GradeOutcome {
    let outcomes = join_all(submissions.into_iter().map(|sub| self.grade_answer(quiz, sub))).await;

    let mut records: Vec<AnswerRecord> = quiz
      .answers
      .iter()
      .filter(|r| quiz.question_by_id(&r.question_id).is_some())
      .cloned()
      .collect();
    let mut skipped = Vec::new();
    for outcome in outcomes {
      match outcome {
        AnswerOutcome::Recorded(rec) => {
          // Resubmission replaces the earlier record for that question.
          records.retain(|r| r.question_id != rec.question_id);
          records.push(rec);
        }
        AnswerOutcome::Skipped(s) => skipped.push(s),
      }
    }

    let points: Vec<f64> = records.iter().map(|r| r.similarity_point).collect();
    let result = GradeResult::from_points(&points, quiz.questions.len());
    info!(target: "grading", score = result.score, answered = result.answered, total = result.total, skipped = skipped.len(), "Quiz graded");
    GradeOutcome { result, records, skipped }
  }

  async fn grade_answer(&self, quiz: &ExerciseQuiz, sub: AnswerSubmission) -> AnswerOutcome {
    let Some(question) = quiz.question_by_id(&sub.question_id) else {
      debug!(target: "grading", question_id = %sub.question_id, "Answer for unknown question dropped");
      return AnswerOutcome::Skipped(SkippedAnswer { question_id: sub.question_id, reason: "unknown question".into() });
    };

    let media_type = resolve_media_type(sub.media_type.as_deref(), &sub.payload).unwrap_or_default();
    let (text, similarity_point) = match self.dispatcher.transcribe(&media_type, &sub.payload, &question.item.key).await {
      Ok(t) => (t.text, t.similarity_hint.unwrap_or(0.0)),
      Err(e @ PipelineError::UnsupportedMedia { .. }) => {
        warn!(target: "grading", question_id = %sub.question_id, error = %e, "Answer skipped");
        return AnswerOutcome::Skipped(SkippedAnswer { question_id: sub.question_id, reason: e.to_string() });
      }
      Err(e) => {
        warn!(target: "grading", question_id = %sub.question_id, error = %e, "Transcription failed; answer scored 0");
        (String::new(), 0.0)
      }
    };

    AnswerOutcome::Recorded(record(question, sub, media_type, text, similarity_point))
  }
}

fn record(
  question: &QuizQuestion,
  sub: AnswerSubmission,
  media_type: String,
  transcribed_text: String,
  similarity_point: f64,
) -> AnswerRecord {
  let local_similarity = similarity::score(&question.item.key, &transcribed_text);
  AnswerRecord {
    question_id: question.id.clone(),
    duration_ms: duration_ms(sub.duration_ms, sub.time_opened, sub.time_answered),
    raw_answer_payload: sub.payload,
    media_type,
    transcribed_text,
    similarity_point,
    local_similarity,
    time_opened: sub.time_opened,
    time_answered: sub.time_answered,
  }
}

fn duration_ms(explicit: Option<i64>, opened: DateTime<Utc>, answered: DateTime<Utc>) -> i64 {
  explicit
    .unwrap_or_else(|| (answered - opened).num_milliseconds())
    .max(0)
}
