//! Public protocol structs for the HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{AnswerRecord, AnswerSubmission, ExerciseQuiz, Material, Method, QuestionContent};
use crate::grading::{GradeOutcome, SkippedAnswer};
use crate::logic::QuizGeneration;

#[derive(Debug, Deserialize)]
pub struct GenerateQuizIn {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub quantity: usize,
    /// 0 = mixed
    #[serde(default)]
    pub method: u8,
    #[serde(default, rename = "assetWhitelist")]
    pub asset_whitelist: Vec<String>,
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default, rename = "timeOfDay")]
    pub time_of_day: Option<String>,
}

/// Question as shown to the learner: no expected key.
#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub id: String,
    pub method: Method,
    pub question: QuestionContent,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub questions: Vec<QuestionOut>,
    #[serde(rename = "newlyBanked")]
    pub newly_banked: usize,
    #[serde(rename = "alreadyBanked")]
    pub already_banked: usize,
}

pub fn quiz_out(generation: &QuizGeneration) -> QuizOut {
    let quiz: &ExerciseQuiz = &generation.quiz;
    QuizOut {
        id: quiz.id.clone(),
        user_id: quiz.user_id.clone(),
        questions: quiz
            .questions
            .iter()
            .map(|q| QuestionOut {
                id: q.id.clone(),
                method: q.item.method,
                question: q.item.question.clone(),
            })
            .collect(),
        newly_banked: generation.newly_banked,
        already_banked: generation.already_banked,
    }
}

#[derive(Debug, Deserialize)]
pub struct MaterialIn {
    pub quantity: usize,
    #[serde(default)]
    pub method: u8,
    #[serde(default, rename = "assetWhitelist")]
    pub asset_whitelist: Vec<String>,
    #[serde(default)]
    pub history: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct MaterialsOut {
    pub materials: Vec<Material>,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    #[serde(rename = "questionId")]
    pub question_id: String,
    pub payload: String,
    #[serde(default, rename = "mediaType")]
    pub media_type: Option<String>,
    #[serde(rename = "timeOpened")]
    pub time_opened: DateTime<Utc>,
    #[serde(rename = "timeAnswered")]
    pub time_answered: DateTime<Utc>,
    #[serde(default, rename = "durationMs")]
    pub duration_ms: Option<i64>,
}

impl From<AnswerIn> for AnswerSubmission {
    fn from(a: AnswerIn) -> Self {
        AnswerSubmission {
            question_id: a.question_id,
            payload: a.payload,
            media_type: a.media_type,
            time_opened: a.time_opened,
            time_answered: a.time_answered,
            duration_ms: a.duration_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GradeIn {
    pub answers: Vec<AnswerIn>,
}

#[derive(Debug, Serialize)]
pub struct AnswerOut {
    #[serde(rename = "questionId")]
    pub question_id: String,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    #[serde(rename = "transcribedText")]
    pub transcribed_text: String,
    #[serde(rename = "similarityPoint")]
    pub similarity_point: f64,
    #[serde(rename = "durationMs")]
    pub duration_ms: i64,
}

impl From<&AnswerRecord> for AnswerOut {
    fn from(r: &AnswerRecord) -> Self {
        AnswerOut {
            question_id: r.question_id.clone(),
            media_type: r.media_type.clone(),
            transcribed_text: r.transcribed_text.clone(),
            similarity_point: r.similarity_point,
            duration_ms: r.duration_ms,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GradeOut {
    pub score: u32,
    pub answered: usize,
    pub total: usize,
    pub answers: Vec<AnswerOut>,
    pub skipped: Vec<SkippedAnswer>,
}

pub fn grade_out(outcome: &GradeOutcome) -> GradeOut {
    GradeOut {
        score: outcome.result.score,
        answered: outcome.result.answered,
        total: outcome.result.total,
        answers: outcome.records.iter().map(AnswerOut::from).collect(),
        skipped: outcome.skipped.clone(),
    }
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub kind: &'static str,
    pub message: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
