use anyhow::{Result, Context, anyhow};
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressDrawTarget};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::Config;
use crate::database::Repository;
use crate::language_utils::Language;
use crate::providers::{ProviderFactory, ProviderRegistry};
use crate::telemetry::Telemetry;
use crate::translation::models::{META_POEM_ID, META_POEM_TITLE, META_POET_NAME};
use crate::translation::pricing::{PricingRegistry, StaticPricing};
use crate::translation::services::{PoemLookup, TranslationSink};
use crate::translation::workflow::{ConsoleProgress, ProgressObserver};
use crate::translation::{
    PromptService, StepExecutor, TranslationInput, TranslationOutput, WorkflowMode,
    WorkflowOrchestrator,
};

// @module: Application controller wiring configuration to workflow runs

/// Builds orchestrators from the configuration and runs translations
pub struct Controller {
    // @field: App configuration
    config: Config,
    executor: Arc<StepExecutor>,
    pricing: Arc<dyn PricingRegistry>,
    repository: Option<Repository>,
    telemetry: Arc<Telemetry>,
    show_progress: bool,
}

/// Outcome of one poem of a batch run
pub type BatchOutcome = (String, Result<TranslationOutput>);

impl Controller {
    /// Create a controller using the providers declared in the configuration
    pub fn with_config(config: Config, telemetry: Arc<Telemetry>) -> Result<Self> {
        let providers = Arc::new(ProviderRegistry::from_config(&config));
        Self::with_providers(config, providers, telemetry)
    }

    /// Create a controller with an explicit provider factory
    pub fn with_providers(
        config: Config,
        providers: Arc<dyn ProviderFactory>,
        telemetry: Arc<Telemetry>,
    ) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let prompts = Arc::new(PromptService::new(config.templates_dir.clone()));
        let executor = StepExecutor::new(providers, prompts)
            .with_retry_base_delay(Duration::from_millis(config.workflow.retry_base_delay_ms));
        let pricing = Arc::new(StaticPricing::from_config(&config));

        Ok(Self {
            config,
            executor: Arc::new(executor),
            pricing,
            repository: None,
            telemetry,
            show_progress: true,
        })
    }

    /// Attach poem storage, briefings and translation persistence
    pub fn with_repository(mut self, repository: Repository) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Enable or disable terminal progress bars
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn prompts(&self) -> &PromptService {
        self.executor.prompts()
    }

    /// The attached repository, or an error naming what needs it
    pub fn repository(&self) -> Result<&Repository> {
        self.repository
            .as_ref()
            .ok_or_else(|| anyhow!("No database configured"))
    }

    /// Build an orchestrator for one workflow run
    pub fn orchestrator(
        &self,
        mode: WorkflowMode,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<WorkflowOrchestrator> {
        let steps = self.config.workflow.steps_for(mode)?.clone();

        let mut orchestrator = WorkflowOrchestrator::new(
            Arc::clone(&self.executor),
            steps,
            mode,
            Arc::clone(&self.pricing),
            Arc::clone(&self.telemetry),
        )?;

        if let Some(repository) = &self.repository {
            orchestrator = orchestrator.with_briefings(Arc::new(repository.clone()));
        }
        if let Some(observer) = observer {
            orchestrator = orchestrator.with_observer(observer);
        }

        Ok(orchestrator)
    }

    /// Configured workflow timeout; zero disables it
    fn default_timeout(&self) -> Option<Duration> {
        match self.config.workflow.workflow_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Run one workflow; `timeout` defaults to the configured workflow timeout
    pub async fn translate(
        &self,
        input: &TranslationInput,
        mode: WorkflowMode,
        timeout: Option<Duration>,
    ) -> Result<TranslationOutput> {
        let observer: Option<Arc<dyn ProgressObserver>> = if self.show_progress {
            Some(Arc::new(ConsoleProgress::new()))
        } else {
            None
        };

        self.translate_with_observer(input, mode, timeout, observer).await
    }

    async fn translate_with_observer(
        &self,
        input: &TranslationInput,
        mode: WorkflowMode,
        timeout: Option<Duration>,
        observer: Option<Arc<dyn ProgressObserver>>,
    ) -> Result<TranslationOutput> {
        let orchestrator = self.orchestrator(mode, observer)?;

        let output = match timeout.or_else(|| self.default_timeout()) {
            Some(limit) => orchestrator.execute_with_timeout(input, limit).await?,
            None => orchestrator.execute(input).await?,
        };
        Ok(output)
    }

    /// Build the workflow input for a poem kept in the database
    pub async fn stored_input(&self, poem_id: &str, target_lang: Language) -> Result<TranslationInput> {
        let poem = self
            .repository()?
            .get_poem(poem_id)
            .await?
            .ok_or_else(|| anyhow!("Poem '{}' not found", poem_id))?;

        let metadata = BTreeMap::from([
            (META_POEM_ID.to_string(), poem.id.clone()),
            (META_POET_NAME.to_string(), poem.poet_name.clone()),
            (META_POEM_TITLE.to_string(), poem.poem_title.clone()),
        ]);

        TranslationInput::with_metadata(poem.original_text, poem.source_lang, target_lang, metadata)
            .with_context(|| format!("Poem '{}' cannot be translated", poem_id))
    }

    /// Translate a stored poem
    pub async fn translate_stored(
        &self,
        poem_id: &str,
        target_lang: Language,
        mode: WorkflowMode,
    ) -> Result<TranslationOutput> {
        let input = self.stored_input(poem_id, target_lang).await?;
        self.translate(&input, mode, None).await
    }

    /// Translate several stored poems concurrently.
    ///
    /// At most `max_concurrent_workflows` runs are in flight; outcomes are
    /// returned in input order.
    pub async fn run_batch(
        &self,
        poem_ids: &[String],
        target_lang: Language,
        mode: WorkflowMode,
    ) -> Vec<BatchOutcome> {
        let limit = self.config.workflow.max_concurrent_workflows.max(1);
        let multi = if self.show_progress {
            MultiProgress::new()
        } else {
            MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
        };

        info!(
            "Translating {} poem(s) to {} with up to {} concurrent workflow(s)",
            poem_ids.len(),
            target_lang,
            limit
        );

        let mut outcomes: Vec<(usize, BatchOutcome)> = stream::iter(poem_ids.iter().enumerate())
            .map(|(position, poem_id)| {
                let multi = &multi;
                async move {
                    let observer: Arc<dyn ProgressObserver> =
                        Arc::new(ConsoleProgress::attached(multi));
                    let result = match self.stored_input(poem_id, target_lang).await {
                        Ok(input) => {
                            self.translate_with_observer(&input, mode, None, Some(observer))
                                .await
                        }
                        Err(e) => Err(e),
                    };
                    if let Err(e) = &result {
                        error!("Poem '{}' failed: {:#}", poem_id, e);
                    }
                    (position, (poem_id.clone(), result))
                }
            })
            .buffer_unordered(limit)
            .collect()
            .await;

        outcomes.sort_by_key(|(position, _)| *position);
        outcomes.into_iter().map(|(_, outcome)| outcome).collect()
    }

    /// Persist a finished translation, returning its record id
    pub async fn save(&self, output: &TranslationOutput) -> Result<String> {
        let repository = self.repository()?;
        match repository.save(output, output.workflow_mode).await {
            Ok(id) => Ok(id),
            Err(e) => {
                warn!("Failed to save workflow {}: {:#}", output.workflow_id, e);
                Err(e)
            }
        }
    }
}
