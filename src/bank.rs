//! Content-addressed question bank.
//!
//! Entries are keyed by a blake3 digest of the normalized `(question value, key)`
//! pair, so regenerating the same question never grows the catalog. Entries are
//! written once and never mutated here. Image questions are stored under their bare
//! asset name, not the serving path handed to learners.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use crate::domain::{ContentHash, Method, QuestionContent, QuestionItem};
use crate::error::PipelineError;
use crate::util::collapse_whitespace_lower;
use crate::validate::canonical_asset_name;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuestionBankEntry {
  pub hash: ContentHash,
  pub method: Method,
  pub question: QuestionContent,
  pub key: String,
  pub created_at: DateTime<Utc>,
}

/// Storage behind the bank. `insert_if_absent` must be atomic per hash.
#[async_trait]
pub trait BankStore: Send + Sync {
  async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<QuestionBankEntry>, PipelineError>;

  /// Returns `false` when an entry with the same hash already exists.
  async fn insert_if_absent(&self, entry: QuestionBankEntry) -> Result<bool, PipelineError>;
}

#[derive(Clone, Default)]
pub struct InMemoryBankStore {
  entries: Arc<RwLock<HashMap<ContentHash, QuestionBankEntry>>>,
}

impl InMemoryBankStore {
  pub fn new() -> Self { Self::default() }

  #[cfg(test)]
  pub async fn len(&self) -> usize { self.entries.read().await.len() }
}

#[async_trait]
impl BankStore for InMemoryBankStore {
  async fn find_by_hash(&self, hash: &ContentHash) -> Result<Option<QuestionBankEntry>, PipelineError> {
    Ok(self.entries.read().await.get(hash).cloned())
  }

  async fn insert_if_absent(&self, entry: QuestionBankEntry) -> Result<bool, PipelineError> {
    let mut entries = self.entries.write().await;
    if entries.contains_key(&entry.hash) {
      return Ok(false);
    }
    entries.insert(entry.hash.clone(), entry);
    Ok(true)
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankWrite {
  Inserted,
  /// Same content was already banked; a normal outcome.
  AlreadyPresent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BankUpsert {
  pub hash: ContentHash,
  pub write: BankWrite,
}

/// Question content in the form the bank stores it.
pub fn bank_form(question: &QuestionContent) -> QuestionContent {
  match question {
    QuestionContent::Path(p) => QuestionContent::Path(canonical_asset_name(p)),
    other => other.clone(),
  }
}

pub fn content_hash(item: &QuestionItem) -> ContentHash {
  let value = collapse_whitespace_lower(bank_form(&item.question).value());
  let key = collapse_whitespace_lower(&item.key);
  let mut hasher = blake3::Hasher::new();
  hasher.update(value.as_bytes());
  // unit separator keeps ("ab", "c") apart from ("a", "bc")
  hasher.update(&[0x1f]);
  hasher.update(key.as_bytes());
  ContentHash(hasher.finalize().to_hex().to_string())
}

#[derive(Clone)]
pub struct QuestionBank {
  store: Arc<dyn BankStore>,
}

impl QuestionBank {
  pub fn new(store: Arc<dyn BankStore>) -> Self { Self { store } }

  #[cfg(test)]
  pub async fn get(&self, hash: &ContentHash) -> Result<Option<QuestionBankEntry>, PipelineError> {
    self.store.find_by_hash(hash).await
  }

  #[instrument(target = "generation", level = "debug", skip(self, item), fields(method = item.method.number()))]
  pub async fn upsert_if_absent(&self, item: &QuestionItem) -> Result<BankUpsert, PipelineError> {
    let hash = content_hash(item);
    if self.store.find_by_hash(&hash).await?.is_some() {
      debug!(target: "generation", %hash, "Question already banked");
      return Ok(BankUpsert { hash, write: BankWrite::AlreadyPresent });
    }

    let entry = QuestionBankEntry {
      hash: hash.clone(),
      method: item.method,
      question: bank_form(&item.question),
      key: item.key.clone(),
      created_at: Utc::now(),
    };
    // A concurrent writer may have won between lookup and insert; that is still a no-op.
    let write = if self.store.insert_if_absent(entry).await? {
      debug!(target: "generation", %hash, "Question banked");
      BankWrite::Inserted
    } else {
      debug!(target: "generation", %hash, "Question banked concurrently");
      BankWrite::AlreadyPresent
    };
    Ok(BankUpsert { hash, write })
  }
}
