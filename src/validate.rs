//! Filtering and normalization of model-generated items.
//!
//! Rules run in order and the first failure drops the item:
//!   1. method is an integer in 1..=6
//!   2. a specifically requested method must match exactly
//!   3. arithmetic questions are plain text (no image, no colour)
//!   4. image paths must name a whitelisted asset
//!   5. word-ordering questions are a case-sensitive permutation of the key
//! Items whose question payload can't be typed, or that lack a key, are dropped too.
//! Surviving image paths are rewritten to the serving path, then the list is cut to
//! the requested quantity. Fewer survivors than requested is fine.

use std::fmt;

use tracing::{debug, info, instrument};

use crate::domain::{
  GeneratedItem, GeneratedMaterial, GenerationRequest, Material, MaterialRequest, Method,
  QuestionContent, QuestionItem, QuestionKind,
};

const ASSET_EXT: &str = ".png";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
  MethodOutOfRange,
  MethodMismatch { requested: Method, got: Method },
  BadQuestion(String),
  MissingKey,
  ArithmeticNotText,
  AssetNotWhitelisted(String),
  OrderingNotPermutation,
}

impl fmt::Display for DropReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      DropReason::MethodOutOfRange => write!(f, "method is not an integer in 1..=6"),
      DropReason::MethodMismatch { requested, got } => {
        write!(f, "method {} requested, got {}", requested.number(), got.number())
      }
      DropReason::BadQuestion(e) => write!(f, "bad question: {e}"),
      DropReason::MissingKey => write!(f, "missing key"),
      DropReason::ArithmeticNotText => write!(f, "arithmetic item is not a text question"),
      DropReason::AssetNotWhitelisted(name) => write!(f, "asset '{name}' not in whitelist"),
      DropReason::OrderingNotPermutation => write!(f, "ordering question is not a permutation of the key"),
    }
  }
}

/// Last path segment of an asset reference.
pub fn asset_filename(value: &str) -> &str {
  value.rsplit('/').next().unwrap_or(value).trim()
}

/// Bare asset name with the `.png` extension, as stored in the bank.
pub fn canonical_asset_name(value: &str) -> String {
  let name = asset_filename(value);
  if name.to_ascii_lowercase().ends_with(ASSET_EXT) {
    name.to_string()
  } else {
    format!("{name}{ASSET_EXT}")
  }
}

fn asset_stem(name: &str) -> &str {
  let lower_ends = name.to_ascii_lowercase().ends_with(ASSET_EXT);
  if lower_ends { &name[..name.len() - ASSET_EXT.len()] } else { name }
}

fn whitelisted(name: &str, whitelist: &[String]) -> bool {
  let stem = asset_stem(name);
  whitelist.iter().any(|w| asset_stem(asset_filename(w)) == stem)
}

fn same_words_any_order(question: &str, key: &str) -> bool {
  let mut a: Vec<&str> = question.split_whitespace().collect();
  let mut b: Vec<&str> = key.split_whitespace().collect();
  a.sort_unstable();
  b.sort_unstable();
  !a.is_empty() && a == b
}

#[derive(Clone, Debug)]
pub struct ConstraintValidator {
  serving_prefix: String,
}

impl ConstraintValidator {
  pub fn new(serving_prefix: &str) -> Self {
    Self { serving_prefix: serving_prefix.to_string() }
  }

  /// Apply every rule to one raw item, returning the typed (not yet normalized) item.
  pub fn check(&self, raw: &GeneratedItem, req: &GenerationRequest) -> Result<QuestionItem, DropReason> {
    let method = raw
      .method_number()
      .and_then(Method::from_number)
      .ok_or(DropReason::MethodOutOfRange)?;

    if let Some(requested) = req.method {
      if requested != method {
        return Err(DropReason::MethodMismatch { requested, got: method });
      }
    }

    let (kind, value) = raw
      .question_parts()
      .ok_or_else(|| DropReason::BadQuestion("no question value".into()))?;
    let question = QuestionContent::new(kind.as_deref(), &value).map_err(DropReason::BadQuestion)?;
    let key = raw.key_text().ok_or(DropReason::MissingKey)?.trim().to_string();

    if method == Method::Arithmetic && question.kind() != QuestionKind::Text {
      return Err(DropReason::ArithmeticNotText);
    }

    if let QuestionContent::Path(path) = &question {
      let name = asset_filename(path);
      if !whitelisted(name, &req.asset_whitelist) {
        return Err(DropReason::AssetNotWhitelisted(name.to_string()));
      }
    }

    if method == Method::WordOrdering && !same_words_any_order(question.value(), &key) {
      return Err(DropReason::OrderingNotPermutation);
    }

    Ok(QuestionItem { method, question, key })
  }

  /// Rewrite image paths to `<serving_prefix><name>.png`.
  pub fn normalize(&self, mut item: QuestionItem) -> QuestionItem {
    if let QuestionContent::Path(path) = &item.question {
      item.question = QuestionContent::Path(format!("{}{}", self.serving_prefix, canonical_asset_name(path)));
    }
    item
  }

  #[instrument(target = "generation", level = "info", skip(self, items, req), fields(received = items.len(), quantity = req.quantity))]
  pub fn validate(&self, items: Vec<GeneratedItem>, req: &GenerationRequest) -> Vec<QuestionItem> {
    let mut accepted = Vec::with_capacity(items.len().min(req.quantity));
    for (idx, raw) in items.iter().enumerate() {
      match self.check(raw, req) {
        Ok(item) => accepted.push(self.normalize(item)),
        Err(reason) => debug!(target: "generation", idx, %reason, "Dropped generated item"),
      }
    }
    let survived = accepted.len();
    accepted.truncate(req.quantity);
    info!(target: "generation", survived, kept = accepted.len(), "Validated generated items");
    accepted
  }

  /// Same idea for materials: typed method, requested-method match, non-empty text.
  pub fn validate_materials(&self, items: Vec<GeneratedMaterial>, req: &MaterialRequest) -> Vec<Material> {
    let mut out: Vec<Material> = items
      .into_iter()
      .filter_map(|raw| {
        let method = raw.method.as_i64().and_then(Method::from_number)?;
        if req.method.map(|m| m != method).unwrap_or(false) {
          return None;
        }
        let title = raw.title.trim();
        let content = raw.content.trim();
        if title.is_empty() || content.is_empty() {
          return None;
        }
        Some(Material { title: title.to_string(), content: content.to_string(), method })
      })
      .collect();
    out.truncate(req.quantity);
    out
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn raw(v: serde_json::Value) -> GeneratedItem { serde_json::from_value(v).unwrap() }

  fn validator() -> ConstraintValidator { ConstraintValidator::new("image/exercise/") }

  fn req(quantity: usize, method: u8, whitelist: &[&str]) -> GenerationRequest {
    GenerationRequest::new(quantity, method)
      .unwrap()
      .with_whitelist(whitelist.iter().map(|s| s.to_string()).collect())
  }

  #[test]
  fn arithmetic_image_dropped_regardless_of_whitelist() {
    let item = raw(json!({"method": 6, "question": {"type": "path", "value": "cat.png"}, "key": "5"}));
    let r = req(5, 0, &["cat.png"]);
    assert_eq!(validator().check(&item, &r), Err(DropReason::ArithmeticNotText));
    assert!(validator().validate(vec![item], &r).is_empty());
  }

  #[test]
  fn arithmetic_colour_dropped_explicit_or_inferred() {
    let r = req(5, 0, &[]);
    let explicit = raw(json!({"method": 6, "question": {"type": "hex", "value": "#abc"}, "key": "5"}));
    let inferred = raw(json!({"method": 6, "question": "#abc", "key": "5"}));
    assert_eq!(validator().check(&explicit, &r), Err(DropReason::ArithmeticNotText));
    assert_eq!(validator().check(&inferred, &r), Err(DropReason::ArithmeticNotText));
    let plain = raw(json!({"method": 6, "question": "2 + 3", "key": "5"}));
    assert_eq!(validator().validate(vec![explicit, inferred, plain], &r).len(), 1);
  }

  #[test]
  fn unlisted_image_dropped() {
    let item = raw(json!({"method": 5, "question": {"type": "path", "value": "dog.png"}, "key": "anjing"}));
    let r = req(5, 0, &["cat.png"]);
    assert_eq!(validator().check(&item, &r), Err(DropReason::AssetNotWhitelisted("dog.png".into())));
  }

  #[test]
  fn whitelisted_image_rewritten_to_serving_path() {
    let r = req(5, 5, &["cat.png", "ball"]);
    let items = vec![
      raw(json!({"method": 5, "question": {"type": "path", "value": "assets/cat.png"}, "key": "kucing"})),
      raw(json!({"method": 5, "question": {"type": "path", "value": "ball"}, "key": "bola"})),
      raw(json!({"method": 5, "question": {"type": "hex", "value": "#00ff00"}, "key": "hijau"})),
    ];
    let out = validator().validate(items, &r);
    assert_eq!(out.len(), 3);
    assert_eq!(out[0].question, QuestionContent::Path("image/exercise/cat.png".into()));
    assert_eq!(out[1].question, QuestionContent::Path("image/exercise/ball.png".into()));
    assert_eq!(out[2].question, QuestionContent::HexColor("#00FF00".into()));
  }

  #[test]
  fn method_rules() {
    let r = req(5, 2, &[]);
    let v = validator();
    assert_eq!(v.check(&raw(json!({"method": 0, "question": "a", "key": "a"})), &r), Err(DropReason::MethodOutOfRange));
    assert_eq!(v.check(&raw(json!({"method": 7, "question": "a", "key": "a"})), &r), Err(DropReason::MethodOutOfRange));
    assert_eq!(v.check(&raw(json!({"method": 2.5, "question": "a", "key": "a"})), &r), Err(DropReason::MethodOutOfRange));
    assert_eq!(v.check(&raw(json!({"method": "2", "question": "a", "key": "a"})), &r), Err(DropReason::MethodOutOfRange));
    assert_eq!(
      v.check(&raw(json!({"method": 1, "question": "a", "key": "a"})), &r),
      Err(DropReason::MethodMismatch { requested: Method::Writing, got: Method::Listening })
    );
    assert!(v.check(&raw(json!({"method": 2, "question": "tulis buku", "key": "buku"})), &r).is_ok());
  }

  #[test]
  fn ordering_must_keep_words_and_casing() {
    let r = req(5, 4, &[]);
    let v = validator();
    let ok = raw(json!({"method": 4, "question": "pasar ke pergi Ibu", "key": "Ibu pergi ke pasar"}));
    assert!(v.check(&ok, &r).is_ok());
    let recased = raw(json!({"method": 4, "question": "pasar ke pergi ibu", "key": "Ibu pergi ke pasar"}));
    assert_eq!(v.check(&recased, &r), Err(DropReason::OrderingNotPermutation));
  }

  #[test]
  fn missing_parts_are_dropped() {
    let r = req(5, 0, &[]);
    let v = validator();
    assert_eq!(v.check(&raw(json!({"method": 1, "question": "buku"})), &r), Err(DropReason::MissingKey));
    assert!(matches!(v.check(&raw(json!({"method": 1, "key": "buku"})), &r), Err(DropReason::BadQuestion(_))));
  }

  #[test]
  fn output_is_bounded_by_quantity() {
    let items: Vec<GeneratedItem> = (0..8)
      .map(|i| raw(json!({"method": 6, "question": format!("{i} + 1"), "key": (i + 1).to_string()})))
      .collect();
    for quantity in 1..10 {
      let r = req(quantity, 0, &[]);
      let out = validator().validate(items.clone(), &r);
      assert_eq!(out.len(), quantity.min(8));
      assert!(out.iter().all(|i| i.method == Method::Arithmetic && i.question.kind() == QuestionKind::Text));
    }
  }

  #[test]
  fn materials_filtered_and_truncated() {
    let mut r = MaterialRequest::new(1, 3).unwrap();
    r.asset_whitelist = vec![];
    let items: Vec<GeneratedMaterial> = serde_json::from_value(json!([
      {"title": "", "content": "x", "method": 3},
      {"title": "Pasar", "content": "Ibu pergi ke pasar.", "method": 1},
      {"title": "Kebun", "content": "Ayah di kebun.", "method": 3},
      {"title": "Sawah", "content": "Adik di sawah.", "method": 3}
    ]))
    .unwrap();
    let out = validator().validate_materials(items, &r);
    assert_eq!(out, vec![Material { title: "Kebun".into(), content: "Ayah di kebun.".into(), method: Method::ReadingAloud }]);
  }
}
