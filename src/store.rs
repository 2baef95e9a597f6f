//! Exercise storage collaborator: `find_by_id`, `find`, `save`.
//!
//! The real document store lives outside this service; the in-memory version backs
//! the binary and the tests. Two `save` calls are never atomic with each other.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ExerciseQuiz;
use crate::error::PipelineError;

#[derive(Clone, Debug, Default)]
pub struct QuizFilter {
  pub user_id: Option<String>,
  pub graded_only: bool,
}

#[async_trait]
pub trait ExerciseStore: Send + Sync {
  async fn find_by_id(&self, id: &str) -> Result<Option<ExerciseQuiz>, PipelineError>;
  /// Matching quizzes, newest first.
  async fn find(&self, filter: &QuizFilter) -> Result<Vec<ExerciseQuiz>, PipelineError>;
  async fn save(&self, quiz: ExerciseQuiz) -> Result<(), PipelineError>;
}

#[derive(Clone, Default)]
pub struct InMemoryExerciseStore {
  quizzes: Arc<RwLock<HashMap<String, ExerciseQuiz>>>,
}

impl InMemoryExerciseStore {
  pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl ExerciseStore for InMemoryExerciseStore {
  async fn find_by_id(&self, id: &str) -> Result<Option<ExerciseQuiz>, PipelineError> {
    Ok(self.quizzes.read().await.get(id).cloned())
  }

  async fn find(&self, filter: &QuizFilter) -> Result<Vec<ExerciseQuiz>, PipelineError> {
    let quizzes = self.quizzes.read().await;
    let mut out: Vec<ExerciseQuiz> = quizzes
      .values()
      .filter(|q| filter.user_id.as_deref().map(|u| q.user_id == u).unwrap_or(true))
      .filter(|q| !filter.graded_only || q.grade.is_some())
      .cloned()
      .collect();
    out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(out)
  }

  async fn save(&self, quiz: ExerciseQuiz) -> Result<(), PipelineError> {
    self.quizzes.write().await.insert(quiz.id.clone(), quiz);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::GradeResult;
  use chrono::{Duration, Utc};

  fn quiz(id: &str, user: &str, age_min: i64, graded: bool) -> ExerciseQuiz {
    ExerciseQuiz {
      id: id.into(),
      user_id: user.into(),
      created_at: Utc::now() - Duration::minutes(age_min),
      questions: vec![],
      answers: vec![],
      grade: graded.then_some(GradeResult { score: 10, answered: 0, total: 0 }),
    }
  }

  #[tokio::test]
  async fn find_filters_and_orders_newest_first() {
    let store = InMemoryExerciseStore::new();
    store.save(quiz("old", "u1", 30, true)).await.unwrap();
    store.save(quiz("new", "u1", 1, true)).await.unwrap();
    store.save(quiz("open", "u1", 5, false)).await.unwrap();
    store.save(quiz("other", "u2", 2, true)).await.unwrap();

    let filter = QuizFilter { user_id: Some("u1".into()), graded_only: true };
    let ids: Vec<String> = store.find(&filter).await.unwrap().into_iter().map(|q| q.id).collect();
    assert_eq!(ids, vec!["new", "old"]);

    assert_eq!(store.find(&QuizFilter::default()).await.unwrap().len(), 4);
    assert!(store.find_by_id("open").await.unwrap().is_some());
    assert!(store.find_by_id("missing").await.unwrap().is_none());
  }
}
