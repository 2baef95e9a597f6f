//! Cleanup of raw model text before structured parsing.
//!
//! `sanitize` removes incidental wrapping (code fences, a "Here is ...:" preamble,
//! outer whitespace). `parse` never fails loudly: `None` is the uniform retry signal.

use serde::de::DeserializeOwned;

const PREAMBLES: [&str; 3] = ["here is", "here are", "here's"];

/// Strip fences and preambles until nothing changes, so the result is a fixpoint.
pub fn sanitize(raw: &str) -> String {
  let mut current = raw.trim();
  loop {
    let next = strip_preamble(strip_fences(current).trim()).trim();
    if next == current {
      return next.to_string();
    }
    current = next;
  }
}

fn strip_fences(s: &str) -> &str {
  let mut s = s;
  if let Some(rest) = s.strip_prefix("```") {
    // Drop the language tag, e.g. ```json
    let tag_end = rest.find(|c: char| !c.is_ascii_alphanumeric()).unwrap_or(rest.len());
    s = &rest[tag_end..];
  }
  if let Some(rest) = s.trim_end().strip_suffix("```") {
    s = rest;
  }
  s
}

fn strip_preamble(s: &str) -> &str {
  let starts_with_preamble = PREAMBLES.iter().any(|p| {
    s.get(..p.len()).map(|head| head.eq_ignore_ascii_case(p)).unwrap_or(false)
  });
  if !starts_with_preamble {
    return s;
  }
  match s.find(':') {
    Some(idx) => &s[idx + 1..],
    None => s,
  }
}

/// Parse cleaned text as JSON into `T`. Falls back to the outermost `[...]` / `{...}`
/// span when the model added trailing chatter.
pub fn parse<T: DeserializeOwned>(clean: &str) -> Option<T> {
  if let Ok(v) = serde_json::from_str::<T>(clean) {
    return Some(v);
  }
  let span = json_span(clean)?;
  serde_json::from_str::<T>(span).ok()
}

fn json_span(s: &str) -> Option<&str> {
  let start = s.find(|c| c == '[' || c == '{')?;
  let close = if s[start..].starts_with('[') { ']' } else { '}' };
  let end = s.rfind(close)?;
  if end <= start {
    return None;
  }
  Some(&s[start..=end])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strips_fence_and_language_tag() {
    assert_eq!(sanitize("```json\n[1, 2]\n```"), "[1, 2]");
    assert_eq!(sanitize("  ```\n{\"a\":1}\n```  "), "{\"a\":1}");
    assert_eq!(sanitize("```[1]```"), "[1]");
  }

  #[test]
  fn strips_preamble_case_insensitively() {
    assert_eq!(sanitize("Here is the quiz:\n[1]"), "[1]");
    assert_eq!(sanitize("HERE ARE your items: ```json\n[2]\n```"), "[2]");
    assert_eq!(sanitize("here's: {}"), "{}");
    // no colon: left alone
    assert_eq!(sanitize("Here is nothing"), "Here is nothing");
  }

  #[test]
  fn sanitize_is_idempotent() {
    let inputs = [
      "```json\n[1]\n```",
      "Here is: here is: [1]",
      "Here is the JSON:\n```json\nHere are items: [3]\n```",
      "   plain text   ",
      "```",
      "",
      "here is é:```x```",
    ];
    for x in inputs {
      let once = sanitize(x);
      assert_eq!(sanitize(&once), once, "input {x:?}");
    }
  }

  #[test]
  fn parse_returns_none_instead_of_error() {
    assert_eq!(parse::<Vec<u8>>("[1, 2]"), Some(vec![1, 2]));
    assert_eq!(parse::<Vec<u8>>("not json"), None);
    assert_eq!(parse::<Vec<u8>>("[1, 2"), None);
  }

  #[test]
  fn parse_recovers_json_span() {
    assert_eq!(parse::<Vec<u8>>("[1, 2]\nHope this helps!"), Some(vec![1, 2]));
    let v: Option<serde_json::Value> = parse("Sure. {\"a\": [1]} done");
    assert_eq!(v, Some(serde_json::json!({"a": [1]})));
  }
}
