//! Domain models: exercise methods, question content, quiz items, answer records,
//! generation requests and grade results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Upper bound on graded answers fed back into a generation prompt.
pub const MAX_ASSESSMENT_SAMPLE: usize = 10;

/// Exercise modality. Serialized as its integer tag (1..=6).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Method {
  Listening = 1,
  Writing = 2,
  ReadingAloud = 3,
  WordOrdering = 4,
  RapidNaming = 5,
  Arithmetic = 6,
}

impl Method {
  pub fn from_number(n: i64) -> Option<Self> {
    match n {
      1 => Some(Method::Listening),
      2 => Some(Method::Writing),
      3 => Some(Method::ReadingAloud),
      4 => Some(Method::WordOrdering),
      5 => Some(Method::RapidNaming),
      6 => Some(Method::Arithmetic),
      _ => None,
    }
  }

  pub fn number(self) -> u8 { self as u8 }

  pub fn label(self) -> &'static str {
    match self {
      Method::Listening => "listening",
      Method::Writing => "writing",
      Method::ReadingAloud => "reading aloud",
      Method::WordOrdering => "word ordering",
      Method::RapidNaming => "rapid naming",
      Method::Arithmetic => "arithmetic",
    }
  }
}

impl TryFrom<u8> for Method {
  type Error = String;
  fn try_from(n: u8) -> Result<Self, Self::Error> {
    Method::from_number(n as i64).ok_or_else(|| format!("method must be in 1..=6, got {n}"))
  }
}

impl From<Method> for u8 {
  fn from(m: Method) -> u8 { m.number() }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QuestionKind {
  Text,
  Path,
  HexColor,
}

/// What the learner is shown. Payload is validated at construction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum QuestionContent {
  Text(String),
  Path(String),
  HexColor(String),
}

impl QuestionContent {
  /// Build typed content from a legacy `(type, value)` pair.
  /// A missing type with a hex-looking value is a colour; otherwise text.
  pub fn new(kind: Option<&str>, value: &str) -> Result<Self, String> {
    let value = value.trim();
    let kind = kind.map(|k| k.trim().to_ascii_lowercase());
    match kind.as_deref() {
      Some("path") | Some("image") => Self::path(value),
      Some("hex") | Some("hex_color") | Some("color") | Some("colour") => Self::hex_color(value),
      Some("text") => Self::text(value),
      None | Some("") => {
        if is_hex_color(value) { Self::hex_color(value) } else { Self::text(value) }
      }
      Some(other) => Err(format!("unknown question type '{other}'")),
    }
  }

  pub fn text(value: &str) -> Result<Self, String> {
    if value.trim().is_empty() {
      return Err("text question is empty".into());
    }
    Ok(QuestionContent::Text(value.trim().to_string()))
  }

  pub fn path(value: &str) -> Result<Self, String> {
    let v = value.trim();
    if v.is_empty() || v.ends_with('/') {
      return Err("path question has no filename".into());
    }
    if v.split('/').any(|seg| seg == "..") {
      return Err(format!("path '{v}' escapes the asset directory"));
    }
    Ok(QuestionContent::Path(v.to_string()))
  }

  pub fn hex_color(value: &str) -> Result<Self, String> {
    let v = value.trim();
    if !is_hex_color(v) {
      return Err(format!("'{v}' is not a #RGB or #RRGGBB colour"));
    }
    Ok(QuestionContent::HexColor(v.to_ascii_uppercase()))
  }

  pub fn kind(&self) -> QuestionKind {
    match self {
      QuestionContent::Text(_) => QuestionKind::Text,
      QuestionContent::Path(_) => QuestionKind::Path,
      QuestionContent::HexColor(_) => QuestionKind::HexColor,
    }
  }

  pub fn value(&self) -> &str {
    match self {
      QuestionContent::Text(v) | QuestionContent::Path(v) | QuestionContent::HexColor(v) => v,
    }
  }
}

fn is_hex_color(v: &str) -> bool {
  match v.strip_prefix('#') {
    Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
    None => false,
  }
}

/// A validated question item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionItem {
  pub method: Method,
  pub question: QuestionContent,
  pub key: String,
}

/// Item exactly as the model produced it, before validation.
/// Fields stay loosely typed so one odd item doesn't fail the whole batch parse.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GeneratedItem {
  #[serde(default)] pub method: serde_json::Value,
  #[serde(default)] pub question: serde_json::Value,
  #[serde(default)] pub key: serde_json::Value,
}

impl GeneratedItem {
  /// Integer method tag, if the model emitted one.
  pub fn method_number(&self) -> Option<i64> { self.method.as_i64() }

  /// `(type, value)` of the question. Accepts `{type, value}` objects and bare scalars.
  pub fn question_parts(&self) -> Option<(Option<String>, String)> {
    match &self.question {
      serde_json::Value::Object(map) => {
        let kind = map.get("type").and_then(|t| t.as_str()).map(str::to_string);
        let value = map.get("value").and_then(scalar_to_string)?;
        Some((kind, value))
      }
      other => scalar_to_string(other).map(|v| (None, v)),
    }
  }

  pub fn key_text(&self) -> Option<String> {
    scalar_to_string(&self.key).filter(|k| !k.trim().is_empty())
  }
}

fn scalar_to_string(v: &serde_json::Value) -> Option<String> {
  match v {
    serde_json::Value::String(s) => Some(s.clone()),
    serde_json::Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Model output for a quiz: a bare list or `{"questions": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum QuizBatch {
  List(Vec<GeneratedItem>),
  Wrapped { questions: Vec<GeneratedItem> },
}

impl QuizBatch {
  pub fn into_items(self) -> Vec<GeneratedItem> {
    match self {
      QuizBatch::List(v) | QuizBatch::Wrapped { questions: v } => v,
    }
  }
}

/// Deterministic digest of normalized question content (hex).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl fmt::Display for ContentHash {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// One previously graded answer, fed back to the model as context.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssessmentSample {
  pub method: Method,
  pub question: String,
  pub key: String,
  pub answer: String,
  pub similarity_point: f64,
}

/// Ephemeral input of a quiz generation run.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  pub quantity: usize,
  /// `None` means mixed (method 0).
  pub method: Option<Method>,
  pub history: Vec<String>,
  pub assessment_sample: Vec<AssessmentSample>,
  pub asset_whitelist: Vec<String>,
  pub time_of_day: Option<String>,
}

impl GenerationRequest {
  pub fn new(quantity: usize, method: u8) -> Result<Self, PipelineError> {
    Ok(Self {
      quantity: check_quantity(quantity)?,
      method: requested_method(method)?,
      history: Vec::new(),
      assessment_sample: Vec::new(),
      asset_whitelist: Vec::new(),
      time_of_day: None,
    })
  }

  pub fn with_history(mut self, history: Vec<String>) -> Self {
    self.history = history;
    self
  }

  /// Keeps at most `MAX_ASSESSMENT_SAMPLE` entries; callers pass newest first.
  pub fn with_assessment(mut self, mut sample: Vec<AssessmentSample>) -> Self {
    sample.truncate(MAX_ASSESSMENT_SAMPLE);
    self.assessment_sample = sample;
    self
  }

  pub fn with_whitelist(mut self, whitelist: Vec<String>) -> Self {
    self.asset_whitelist = whitelist;
    self
  }

  pub fn with_time_of_day(mut self, time_of_day: impl Into<String>) -> Self {
    self.time_of_day = Some(time_of_day.into());
    self
  }
}

/// Input of a reading/learning material generation run.
#[derive(Clone, Debug)]
pub struct MaterialRequest {
  pub quantity: usize,
  pub method: Option<Method>,
  pub history: Vec<String>,
  pub asset_whitelist: Vec<String>,
}

impl MaterialRequest {
  pub fn new(quantity: usize, method: u8) -> Result<Self, PipelineError> {
    Ok(Self {
      quantity: check_quantity(quantity)?,
      method: requested_method(method)?,
      history: Vec::new(),
      asset_whitelist: Vec::new(),
    })
  }
}

fn check_quantity(quantity: usize) -> Result<usize, PipelineError> {
  if quantity == 0 {
    return Err(PipelineError::InvalidRequest("quantity must be greater than zero".into()));
  }
  Ok(quantity)
}

fn requested_method(method: u8) -> Result<Option<Method>, PipelineError> {
  if method == 0 {
    return Ok(None);
  }
  Method::try_from(method).map(Some).map_err(PipelineError::InvalidRequest)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
  pub title: String,
  pub content: String,
  pub method: Method,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GeneratedMaterial {
  #[serde(default)] pub title: String,
  #[serde(default)] pub content: String,
  #[serde(default)] pub method: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MaterialBatch {
  List(Vec<GeneratedMaterial>),
  Wrapped { materials: Vec<GeneratedMaterial> },
}

impl MaterialBatch {
  pub fn into_items(self) -> Vec<GeneratedMaterial> {
    match self {
      MaterialBatch::List(v) | MaterialBatch::Wrapped { materials: v } => v,
    }
  }
}

/// A question as assigned inside a quiz: an independent copy of the bank content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuizQuestion {
  pub id: String,
  pub bank_hash: ContentHash,
  pub item: QuestionItem,
}

/// Learner answer as submitted, before grading.
#[derive(Clone, Debug, Deserialize)]
pub struct AnswerSubmission {
  pub question_id: String,
  pub payload: String,
  #[serde(default)] pub media_type: Option<String>,
  pub time_opened: DateTime<Utc>,
  pub time_answered: DateTime<Utc>,
  #[serde(default)] pub duration_ms: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerRecord {
  pub question_id: String,
  pub raw_answer_payload: String,
  pub media_type: String,
  pub transcribed_text: String,
  /// Score used for grading, 0..=100 (service-provided).
  pub similarity_point: f64,
  /// Locally computed positional similarity, kept for auditing.
  pub local_similarity: f64,
  pub duration_ms: i64,
  pub time_opened: DateTime<Utc>,
  pub time_answered: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeResult {
  pub score: u32,
  pub answered: usize,
  pub total: usize,
}

impl GradeResult {
  /// Mean of `points` over `total` questions, truncated. Unanswered questions count as 0.
  pub fn from_points(points: &[f64], total: usize) -> Self {
    if total == 0 {
      return Self { score: 0, answered: points.len(), total };
    }
    let sum = points.iter().fold(0.0_f64, |acc, p| acc + p.clamp(0.0, 100.0));
    let mean = (sum / total as f64).trunc().clamp(0.0, 100.0);
    Self { score: mean as u32, answered: points.len(), total }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExerciseQuiz {
  pub id: String,
  pub user_id: String,
  pub created_at: DateTime<Utc>,
  pub questions: Vec<QuizQuestion>,
  #[serde(default)] pub answers: Vec<AnswerRecord>,
  #[serde(default)] pub grade: Option<GradeResult>,
}

impl ExerciseQuiz {
  pub fn question_by_id(&self, id: &str) -> Option<&QuizQuestion> {
    self.questions.iter().find(|q| q.id == id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn method_serializes_as_integer() {
    let json = serde_json::to_string(&Method::WordOrdering).unwrap();
    assert_eq!(json, "4");
    let m: Method = serde_json::from_str("6").unwrap();
    assert_eq!(m, Method::Arithmetic);
    assert!(serde_json::from_str::<Method>("7").is_err());
  }

  #[test]
  fn question_content_tagging() {
    let q = QuestionContent::new(Some("path"), "cat.png").unwrap();
    assert_eq!(q.kind(), QuestionKind::Path);
    let json = serde_json::to_value(&q).unwrap();
    assert_eq!(json, serde_json::json!({"type": "path", "value": "cat.png"}));

    // implicit hex
    let c = QuestionContent::new(None, "#ff0000").unwrap();
    assert_eq!(c, QuestionContent::HexColor("#FF0000".into()));
    assert_eq!(QuestionContent::new(None, "merah").unwrap().kind(), QuestionKind::Text);

    assert!(QuestionContent::new(Some("hex"), "red").is_err());
    assert!(QuestionContent::new(Some("text"), "   ").is_err());
    assert!(QuestionContent::new(Some("path"), "../etc/passwd").is_err());
    assert!(QuestionContent::new(Some("audio"), "x").is_err());
  }

  #[test]
  fn generated_item_accepts_loose_shapes() {
    let item: GeneratedItem =
      serde_json::from_str(r#"{"method": 6, "question": "2 + 3", "key": 5}"#).unwrap();
    assert_eq!(item.method_number(), Some(6));
    assert_eq!(item.question_parts(), Some((None, "2 + 3".to_string())));
    assert_eq!(item.key_text().as_deref(), Some("5"));

    let batch: QuizBatch = serde_json::from_str(
      r#"{"questions": [{"method": 1, "question": {"type": "text", "value": "buku"}, "key": "buku"}]}"#,
    )
    .unwrap();
    assert_eq!(batch.into_items().len(), 1);
  }

  #[test]
  fn request_construction_rules() {
    assert!(matches!(GenerationRequest::new(0, 1), Err(PipelineError::InvalidRequest(_))));
    assert!(matches!(GenerationRequest::new(3, 7), Err(PipelineError::InvalidRequest(_))));
    assert_eq!(GenerationRequest::new(3, 0).unwrap().method, None);

    let sample: Vec<AssessmentSample> = (0..15)
      .map(|i| AssessmentSample {
        method: Method::Writing,
        question: format!("q{i}"),
        key: "k".into(),
        answer: "a".into(),
        similarity_point: 50.0,
      })
      .collect();
    let req = GenerationRequest::new(2, 2).unwrap().with_assessment(sample);
    assert_eq!(req.assessment_sample.len(), MAX_ASSESSMENT_SAMPLE);
    assert_eq!(req.assessment_sample[0].question, "q0");
  }

  #[test]
  fn grade_counts_unanswered_as_zero() {
    let g = GradeResult::from_points(&[100.0, 100.0], 4);
    assert_eq!(g.score, 50);
    assert_eq!(g.answered, 2);
    assert_eq!(GradeResult::from_points(&[66.6, 33.3], 2).score, 49);
  }

  #[test]
  fn grade_of_empty_quiz_is_zero() {
    assert_eq!(GradeResult::from_points(&[], 0).score, 0);
  }
}
