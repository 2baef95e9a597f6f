//! Service configuration (endpoints, model, prompts) loaded from TOML.
//!
//! Looked up at `LATIHAN_CONFIG_PATH`; any missing section falls back to defaults.
//! A few environment variables override the file:
//!   AI_BASE_URL          : generative model endpoint base URL
//!   AI_MODEL             : model id sent with every generation call
//!   TRANSCRIBE_BASE_URL  : OCR / speech-to-text service base URL

use serde::Deserialize;
use tracing::{error, info, warn};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ServiceConfig {
  #[serde(default)]
  pub model: ModelConfig,
  #[serde(default)]
  pub transcription: TranscriptionConfig,
  #[serde(default)]
  pub generation: GenerationConfig,
  #[serde(default)]
  pub prompts: Prompts,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
  pub base_url: String,
  pub model_id: String,
  pub max_attempts: u32,
}

impl Default for ModelConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:11434".into(),
      model_id: "llama3".into(),
      max_attempts: 3,
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
  pub base_url: String,
  pub ocr_path: String,
  pub stt_path: String,
}

impl Default for TranscriptionConfig {
  fn default() -> Self {
    Self {
      base_url: "http://localhost:5000".into(),
      ocr_path: "/ocr".into(),
      stt_path: "/speech-to-text".into(),
    }
  }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
  /// How many recent graded answers are fed back into quiz prompts (capped at 10).
  pub assessment_sample_size: usize,
  /// Prefix of the canonical serving path for image questions.
  pub serving_prefix: String,
}

impl Default for GenerationConfig {
  fn default() -> Self {
    Self {
      assessment_sample_size: crate::domain::MAX_ASSESSMENT_SAMPLE,
      serving_prefix: "image/exercise/".into(),
    }
  }
}

/// Instruction templates. Placeholders in `{braces}` are filled by `PromptBuilder`.
/// Override them in TOML to tune tone or language.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub quiz_template: String,
  pub material_template: String,
  pub method_rules: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      quiz_template: DEFAULT_QUIZ_TEMPLATE.into(),
      material_template: DEFAULT_MATERIAL_TEMPLATE.into(),
      method_rules: DEFAULT_METHOD_RULES.into(),
    }
  }
}

const DEFAULT_QUIZ_TEMPLATE: &str = r##"You create practice questions for a reading and language tutoring app for young learners.
Current time of day: {time_of_day}

Generate exactly {quantity} question items.
Method: {method}

Method rules:
{method_rules}

Allowed image files (path questions may use ONLY these names, never invent a filename):
{whitelist}

Questions generated recently (do not repeat them):
{history}

The learner's most recent graded answers (similarity 0-100, lower means the learner struggled):
{assessment}

Respond ONLY with a JSON array, no explanation. Each element:
{"method": <integer 1-6>, "question": {"type": "text" | "path" | "hex", "value": "<string>"}, "key": "<expected answer>"}"##;

const DEFAULT_MATERIAL_TEMPLATE: &str = r##"You write short learning materials for a reading and language tutoring app for young learners.

Write exactly {quantity} materials.
Method: {method}

Method rules:
{method_rules}

Allowed image files (mention images ONLY by these names, never invent a filename):
{whitelist}

Materials written recently (do not repeat them):
{history}

Respond ONLY with a JSON array, no explanation. Each element:
{"title": "<short title>", "content": "<material text>", "method": <integer 1-6>}"##;

const DEFAULT_METHOD_RULES: &str = r##"- "method" is always an integer from 1 to 6.
- If a specific method is requested, every item uses exactly that method.
- 1 listening: question is a text the learner hears; key is the same word or sentence.
- 2 writing: question is a text prompt; key is the word or sentence the learner writes.
- 3 reading aloud: question is a text to read aloud; key is the same text.
- 4 word ordering: question is the key sentence with its words shuffled. Same words, same casing, only the order differs.
- 5 rapid naming: question is an image ("type": "path") from the allowed list or a colour ("type": "hex", e.g. "#FF0000"); key is the name of the object or colour.
- 6 arithmetic: question is a text expression such as "2 + 3"; key is the numeric result. Never use an image for arithmetic.
- A "path" question must use a filename from the allowed image list exactly as written."##;

fn apply_env_overrides(cfg: &mut ServiceConfig) {
  if let Ok(v) = std::env::var("AI_BASE_URL") {
    cfg.model.base_url = v;
  }
  if let Ok(v) = std::env::var("AI_MODEL") {
    cfg.model.model_id = v;
  }
  if let Ok(v) = std::env::var("TRANSCRIBE_BASE_URL") {
    cfg.transcription.base_url = v;
  }
}

/// Parse a TOML document into a config. Missing keys take defaults.
pub fn parse_config(src: &str) -> Result<ServiceConfig, toml::de::Error> {
  let mut cfg = toml::from_str::<ServiceConfig>(src)?;
  clamp_limits(&mut cfg);
  Ok(cfg)
}

// Every generation needs at least one model call.
fn clamp_limits(cfg: &mut ServiceConfig) {
  if cfg.model.max_attempts == 0 {
    warn!(target: "latihan_backend", "model.max_attempts = 0 in config; using 1");
    cfg.model.max_attempts = 1;
  }
}

/// Load config from LATIHAN_CONFIG_PATH (defaults on any IO/parse error), then apply env overrides.
pub fn load_config_from_env() -> ServiceConfig {
  let mut cfg = match std::env::var("LATIHAN_CONFIG_PATH") {
    Ok(path) => match std::fs::read_to_string(&path) {
      Ok(s) => match parse_config(&s) {
        Ok(cfg) => {
          info!(target: "latihan_backend", %path, "Loaded service config (TOML)");
          cfg
        }
        Err(e) => {
          error!(target: "latihan_backend", %path, error = %e, "Failed to parse TOML config; using defaults");
          ServiceConfig::default()
        }
      },
      Err(e) => {
        error!(target: "latihan_backend", %path, error = %e, "Failed to read TOML config file; using defaults");
        ServiceConfig::default()
      }
    },
    Err(_) => ServiceConfig::default(),
  };
  apply_env_overrides(&mut cfg);
  cfg
}
