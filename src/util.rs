//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values in a single
/// pass: inserted values are never scanned again. Unknown `{...}` spans stay as-is.
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = String::with_capacity(tpl.len());
  let mut rest = tpl;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    let value = after
      .find('}')
      .and_then(|close| pairs.iter().find(|(k, _)| *k == &after[..close]).map(|(_, v)| (close, *v)));
    match value {
      Some((close, v)) => {
        out.push_str(v);
        rest = &after[close + 1..];
      }
      None => {
        out.push('{');
        rest = after;
      }
    }
  }
  out.push_str(rest);
  out
}

/// Lower-case, trim and collapse inner whitespace runs to a single space.
pub fn collapse_whitespace_lower(s: &str) -> String {
  s.split_whitespace()
    .map(|w| w.to_lowercase())
    .collect::<Vec<_>>()
    .join(" ")
}

/// Media type of a `data:<mime>;base64,...` URL, if the payload carries one.
pub fn data_url_media_type(payload: &str) -> Option<&str> {
  let rest = payload.strip_prefix("data:")?;
  let end = rest.find(|c| c == ';' || c == ',')?;
  let mime = &rest[..end];
  if mime.is_empty() { None } else { Some(mime) }
}

/// Drop a `data:...,` prefix and return the raw payload after the first comma.
/// Payloads without the prefix are returned unchanged.
pub fn strip_data_url_prefix(payload: &str) -> &str {
  if payload.starts_with("data:") {
    match payload.find(',') {
      Some(idx) => &payload[idx + 1..],
      None => payload,
    }
  } else {
    payload
  }
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn template_replaces_every_occurrence() {
    let out = fill_template("{a} and {a} then {b}", &[("a", "x"), ("b", "y")]);
    assert_eq!(out, "x and x then y");
  }

  #[test]
  fn inserted_values_are_not_expanded_again() {
    let out = fill_template("{a}|{b}", &[("a", "{b}"), ("b", "y")]);
    assert_eq!(out, "{b}|y");
  }

  #[test]
  fn unknown_and_json_braces_survive() {
    let tpl = r#"{"method": {n}, "question": {"type": "text"}} {missing"#;
    assert_eq!(fill_template(tpl, &[("n", "3")]), r#"{"method": 3, "question": {"type": "text"}} {missing"#);
  }

  #[test]
  fn collapse_lowercases_and_squeezes() {
    assert_eq!(collapse_whitespace_lower("  Ibu   PERGI\tke\npasar "), "ibu pergi ke pasar");
  }

  #[test]
  fn data_url_helpers() {
    let p = "data:audio/webm;base64,AAAA";
    assert_eq!(data_url_media_type(p), Some("audio/webm"));
    assert_eq!(strip_data_url_prefix(p), "AAAA");
    assert_eq!(strip_data_url_prefix("AAAA"), "AAAA");
    assert_eq!(data_url_media_type("AAAA"), None);
  }

  #[test]
  fn truncation_is_char_safe() {
    let s = "kucing makan ikan";
    assert_eq!(trunc_for_log(s, 100), s);
    assert!(trunc_for_log(s, 6).starts_with("kucing…"));
  }
}
