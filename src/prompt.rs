//! Instruction text for quiz-item and material generation.
//!
//! Rendering is pure: the same request and templates always give the same text.
//! The method rules written into the prompt only steer the model; `validate`
//! enforces them.

use crate::config::Prompts;
use crate::domain::{AssessmentSample, GenerationRequest, MaterialRequest, Method};
use crate::util::fill_template;

#[derive(Clone, Debug)]
pub struct PromptBuilder {
  prompts: Prompts,
}

impl PromptBuilder {
  pub fn new(prompts: Prompts) -> Self { Self { prompts } }

  pub fn quiz_prompt(&self, req: &GenerationRequest) -> String {
    let quantity = req.quantity.to_string();
    let method = describe_method(req.method);
    let time_of_day = req.time_of_day.clone().unwrap_or_else(|| "unspecified".into());
    fill_template(
      &self.prompts.quiz_template,
      &[
        ("quantity", quantity.as_str()),
        ("method", method.as_str()),
        ("method_rules", self.prompts.method_rules.as_str()),
        ("time_of_day", time_of_day.as_str()),
        ("history", render_history(&req.history).as_str()),
        ("assessment", render_assessment(&req.assessment_sample).as_str()),
        ("whitelist", render_whitelist(&req.asset_whitelist).as_str()),
      ],
    )
  }

  pub fn material_prompt(&self, req: &MaterialRequest) -> String {
    let quantity = req.quantity.to_string();
    let method = describe_method(req.method);
    fill_template(
      &self.prompts.material_template,
      &[
        ("quantity", quantity.as_str()),
        ("method", method.as_str()),
        ("method_rules", self.prompts.method_rules.as_str()),
        ("history", render_history(&req.history).as_str()),
        ("whitelist", render_whitelist(&req.asset_whitelist).as_str()),
      ],
    )
  }
}

fn describe_method(method: Option<Method>) -> String {
  match method {
    None => "mixed: choose freely among methods 1 to 6".into(),
    Some(m) => format!("{} ({}). Every item MUST use method {}.", m.number(), m.label(), m.number()),
  }
}

// Filenames go in verbatim as a JSON array so the model can copy them exactly.
fn render_whitelist(whitelist: &[String]) -> String {
  if whitelist.is_empty() {
    return "[] (no images available: do not use \"path\" questions)".into();
  }
  serde_json::to_string(whitelist).unwrap_or_else(|_| whitelist.join(", "))
}

fn render_history(history: &[String]) -> String {
  if history.is_empty() {
    return "(none)".into();
  }
  history.iter().map(|h| format!("- {h}")).collect::<Vec<_>>().join("\n")
}

fn render_assessment(sample: &[AssessmentSample]) -> String {
  if sample.is_empty() {
    return "(none)".into();
  }
  sample
    .iter()
    .map(|s| {
      format!(
        "- method {}: question \"{}\", expected \"{}\", learner answered \"{}\", similarity {:.0}",
        s.method.number(),
        s.question,
        s.key,
        s.answer,
        s.similarity_point
      )
    })
    .collect::<Vec<_>>()
    .join("\n")
}
