//! Positional character similarity between a reference answer and a transcription.
//!
//! Characters are compared index by index after lower-casing and trimming, so an
//! insertion or deletion shifts everything after it out of alignment. Historical
//! scores were computed this way; keep it positional.

/// Score in `[0, 100]`. Two empty strings score 100.
pub fn score(reference: &str, candidate: &str) -> f64 {
  let a: Vec<char> = normalize(reference).chars().collect();
  let b: Vec<char> = normalize(candidate).chars().collect();
  let len = a.len().max(b.len());
  if len == 0 {
    return 100.0;
  }
  let correct = a.iter().zip(b.iter()).filter(|(x, y)| x == y).count();
  100.0 * correct as f64 / len as f64
}

fn normalize(s: &str) -> String {
  s.trim().to_lowercase()
}
