//! Application state: config, prompt builder, model client, validator, question
//! bank, exercise store and grading pipeline.
//!
//! Endpoint configuration is read once at startup and handed to the clients; no
//! process-wide mutable settings exist after that.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::bank::{BankStore, InMemoryBankStore, QuestionBank};
use crate::config::{load_config_from_env, ServiceConfig};
use crate::generation::GenerationClient;
use crate::grading::GradingPipeline;
use crate::prompt::PromptBuilder;
use crate::store::{ExerciseStore, InMemoryExerciseStore};
use crate::transcribe::TranscriptionDispatcher;
use crate::validate::ConstraintValidator;

#[derive(Clone)]
pub struct AppState {
    pub config: ServiceConfig,
    pub prompts: PromptBuilder,
    pub generator: GenerationClient,
    pub validator: ConstraintValidator,
    pub bank: QuestionBank,
    pub exercises: Arc<dyn ExerciseStore>,
    pub grading: GradingPipeline,
}

impl AppState {
    /// Build state from env: load config, create HTTP clients, in-memory stores.
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, reqwest::Error> {
        let config = load_config_from_env();
        // No request deadline: external calls may block their unit of work.
        let http = reqwest::Client::builder().build()?;

        let generator = GenerationClient::from_config(http.clone(), &config.model);
        let dispatcher = TranscriptionDispatcher::from_config(http, &config.transcription);
        info!(
            target: "latihan_backend",
            model_base_url = %config.model.base_url,
            model = %generator.model_id(),
            max_attempts = generator.max_attempts(),
            transcribe_base_url = %config.transcription.base_url,
            "External services configured"
        );

        Ok(Self::assemble(
            config,
            generator,
            dispatcher,
            Arc::new(InMemoryBankStore::new()),
            Arc::new(InMemoryExerciseStore::new()),
        ))
    }

    /// Wire the pipeline from already-built collaborators.
    pub fn assemble(
        config: ServiceConfig,
        generator: GenerationClient,
        dispatcher: TranscriptionDispatcher,
        bank_store: Arc<dyn BankStore>,
        exercises: Arc<dyn ExerciseStore>,
    ) -> Self {
        Self {
            prompts: PromptBuilder::new(config.prompts.clone()),
            validator: ConstraintValidator::new(&config.generation.serving_prefix),
            bank: QuestionBank::new(bank_store),
            grading: GradingPipeline::new(dispatcher),
            generator,
            exercises,
            config,
        }
    }
}
