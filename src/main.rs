// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow, Context};
use clap::{Parser, ValueEnum, CommandFactory, Subcommand};
use clap_complete::{generate, Shell};
use log::{error, info, warn, LevelFilter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use verseflow::app_config::{self, Config};
use verseflow::app_controller::Controller;
use verseflow::database::{DatabaseConnection, Repository};
use verseflow::file_utils::FileManager;
use verseflow::translation::models::{META_POEM_ID, META_POEM_TITLE, META_POET_NAME};
use verseflow::translation::services::PoemRecord;
use verseflow::{Language, Telemetry, TranslationInput, TranslationOutput, WorkflowMode};

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

/// CLI Wrapper for WorkflowMode to implement ValueEnum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliWorkflowMode {
    Reasoning,
    NonReasoning,
    Hybrid,
}

impl From<CliWorkflowMode> for WorkflowMode {
    fn from(mode: CliWorkflowMode) -> Self {
        match mode {
            CliWorkflowMode::Reasoning => WorkflowMode::Reasoning,
            CliWorkflowMode::NonReasoning => WorkflowMode::NonReasoning,
            CliWorkflowMode::Hybrid => WorkflowMode::Hybrid,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Translate a poem read from a text file
    Translate(TranslateArgs),

    /// Translate a poem stored in the database
    Poem {
        /// Stored poem identifier
        #[arg(value_name = "POEM_ID")]
        poem_id: String,

        /// Target language (name or ISO code)
        #[arg(short, long)]
        target_language: Language,

        /// Workflow mode (defaults to the configured mode)
        #[arg(short, long, value_enum)]
        mode: Option<CliWorkflowMode>,

        /// Write the full result as JSON to this file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Do not store the result in the database
        #[arg(long)]
        no_save: bool,
    },

    /// Translate several stored poems concurrently
    Batch {
        /// Stored poem identifiers
        #[arg(value_name = "POEM_ID", required = true)]
        poem_ids: Vec<String>,

        /// Target language (name or ISO code)
        #[arg(short, long)]
        target_language: Language,

        /// Workflow mode (defaults to the configured mode)
        #[arg(short, long, value_enum)]
        mode: Option<CliWorkflowMode>,

        /// Directory receiving one JSON file per poem
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Store a poem, and optionally its briefing, in the database
    AddPoem {
        /// Text file holding the poem
        #[arg(value_name = "POEM_FILE")]
        poem_file: PathBuf,

        /// Identifier to store the poem under
        #[arg(long)]
        id: String,

        /// Source language (name or ISO code)
        #[arg(short, long)]
        source_language: Language,

        #[arg(long, default_value = "Unknown")]
        poet: String,

        #[arg(long, default_value = "Untitled")]
        title: String,

        /// Text file with background notes for the translator
        #[arg(long)]
        briefing: Option<PathBuf>,
    },

    /// List stored translations of a poem
    History {
        #[arg(value_name = "POEM_ID")]
        poem_id: String,
    },

    /// List available prompt templates
    Templates,

    /// Render a prompt template without calling any provider
    Preview {
        /// Template name
        #[arg(value_name = "TEMPLATE")]
        template: String,

        /// Template variable as KEY=VALUE (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Generate shell completions for verseflow
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Parser, Debug)]
struct TranslateArgs {
    /// Text file holding the poem
    #[arg(value_name = "POEM_FILE")]
    poem_file: PathBuf,

    /// Source language (name or ISO code, e.g. 'Chinese', 'zh')
    #[arg(short, long)]
    source_language: Language,

    /// Target language (name or ISO code, e.g. 'English', 'en')
    #[arg(short, long)]
    target_language: Language,

    /// Workflow mode (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    mode: Option<CliWorkflowMode>,

    /// Identifier of the stored poem, used to find its briefing
    #[arg(long)]
    poem_id: Option<String>,

    #[arg(long)]
    poet: Option<String>,

    #[arg(long)]
    title: Option<String>,

    /// Store the result in the database
    #[arg(long)]
    save: bool,

    /// Write the full result as JSON to this file
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Give up after this many seconds (defaults to the configured timeout)
    #[arg(long)]
    timeout: Option<u64>,
}

/// verseflow - three-step AI poetry translation
///
/// Translates poems through an initial translation, an editor review and a
/// revision by the translator, each step driven by a configurable LLM.
#[derive(Parser, Debug)]
#[command(name = "verseflow")]
#[command(version)]
#[command(about = "AI poetry translation with a translator/editor loop")]
#[command(long_about = "verseflow translates poems with a three-step workflow: initial translation, editor review and translator revision.

EXAMPLES:
    verseflow translate poem.txt -s zh -t en                # Translate using the default mode
    verseflow translate poem.txt -s zh -t en -m reasoning   # Use the reasoning models
    verseflow translate poem.txt -s zh -t en -o out.json    # Write the full result as JSON
    verseflow add-poem poem.txt --id jys -s zh --briefing notes.txt
    verseflow poem jys -t fr                                # Translate a stored poem
    verseflow batch jys dfs -t en --output-dir out/         # Translate stored poems concurrently
    verseflow preview initial_translation_nonreasoning      # Render a template
    verseflow completions bash > verseflow.bash             # Generate bash completions

CONFIGURATION:
    Configuration is stored in conf.json by default. You can specify a different
    config file with --config. If the config file doesn't exist, a default one
    will be created automatically. API keys are read from the environment
    variables named in each provider's api_key_env.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long = "config", default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Database file (overrides the configured path)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logger starts at info; the configured level is applied once the config is loaded
    let telemetry = Arc::new(Telemetry::init(LevelFilter::Info)?);

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(*shell, &mut cmd, "verseflow", &mut std::io::stdout());
        return Ok(());
    }

    let result = run(cli, Arc::clone(&telemetry)).await;
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    telemetry.shutdown();
    result
}

async fn run(cli: CommandLineOptions, telemetry: Arc<Telemetry>) -> Result<()> {
    let mut config = Config::load_or_create(&cli.config_path)?;
    if let Some(level) = cli.log_level.clone() {
        config.log_level = level.into();
    }
    telemetry.set_level(config.log_level.into());

    let database = cli.database.clone().or_else(|| config.database_path.clone());
    let default_mode = config.workflow.default_mode;
    let mode_or_default =
        |mode: Option<CliWorkflowMode>| mode.map(WorkflowMode::from).unwrap_or(default_mode);

    match cli.command {
        Commands::Translate(args) => {
            let needs_db = args.save || args.poem_id.is_some();
            let mut controller = Controller::with_config(config, telemetry)?;
            if needs_db {
                controller = controller.with_repository(open_repository(database.as_deref())?);
            }
            run_translate(&controller, args, mode_or_default).await
        }
        Commands::Poem { poem_id, target_language, mode, output, no_save } => {
            let controller = Controller::with_config(config, telemetry)?
                .with_repository(open_repository(database.as_deref())?);
            let output_json = controller
                .translate_stored(&poem_id, target_language, mode_or_default(mode))
                .await?;
            finish(&controller, &output_json, !no_save, output.as_deref()).await
        }
        Commands::Batch { poem_ids, target_language, mode, output_dir } => {
            let controller = Controller::with_config(config, telemetry)?
                .with_repository(open_repository(database.as_deref())?);
            run_batch(&controller, &poem_ids, target_language, mode_or_default(mode), output_dir).await
        }
        Commands::AddPoem { poem_file, id, source_language, poet, title, briefing } => {
            let repository = open_repository(database.as_deref())?;
            let poem = PoemRecord {
                id: id.clone(),
                poet_name: poet,
                poem_title: title,
                source_lang: source_language,
                original_text: FileManager::read_poem(&poem_file)?,
            };
            repository.upsert_poem(&poem).await?;
            if let Some(briefing_file) = briefing {
                let content = std::fs::read_to_string(&briefing_file)
                    .with_context(|| format!("Failed to read briefing file: {:?}", briefing_file))?;
                repository.upsert_briefing(&id, content.trim()).await?;
            }
            info!("Stored poem '{}' ({})", id, repository.stats()?);
            Ok(())
        }
        Commands::History { poem_id } => {
            let repository = open_repository(database.as_deref())?;
            let records = repository.list_translations_for_poem(&poem_id).await?;
            if records.is_empty() {
                println!("No stored translations for poem '{}'", poem_id);
            }
            for record in records {
                println!("{}", record);
            }
            Ok(())
        }
        Commands::Templates => {
            let controller = Controller::with_config(config, telemetry)?;
            let templates = controller.prompts().list_templates();
            if templates.is_empty() {
                warn!("No templates found in {:?}", controller.prompts().template_dir());
            }
            for name in templates {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Preview { template, vars } => {
            let controller = Controller::with_config(config, telemetry)?;
            let variables = parse_variables(&vars)?;
            let (system, user) = controller
                .prompts()
                .safe_render(&template, &variables, &preview_defaults())?;
            println!("=== system ===\n{}\n\n=== user ===\n{}", system, user);
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn run_translate(
    controller: &Controller,
    args: TranslateArgs,
    mode_or_default: impl Fn(Option<CliWorkflowMode>) -> WorkflowMode,
) -> Result<()> {
    if !FileManager::file_exists(&args.poem_file) {
        return Err(anyhow!("Poem file does not exist: {:?}", args.poem_file));
    }

    let text = FileManager::read_poem(&args.poem_file)?;
    let mut metadata = BTreeMap::new();
    for (key, value) in [
        (META_POEM_ID, args.poem_id),
        (META_POET_NAME, args.poet),
        (META_POEM_TITLE, args.title),
    ] {
        if let Some(value) = value {
            metadata.insert(key.to_string(), value);
        }
    }

    let input = TranslationInput::with_metadata(
        text,
        args.source_language,
        args.target_language,
        metadata,
    )?;

    let output = controller
        .translate(&input, mode_or_default(args.mode), args.timeout.map(Duration::from_secs))
        .await?;

    finish(controller, &output, args.save, args.output.as_deref()).await
}

/// Print, optionally store and optionally write a finished translation
async fn finish(
    controller: &Controller,
    output: &TranslationOutput,
    save: bool,
    output_path: Option<&Path>,
) -> Result<()> {
    println!("{}\n", output.final_translation());
    info!("{}", output.summary());

    if save {
        let id = controller.save(output).await?;
        info!("Saved as translation {}", id);
    }

    if let Some(path) = output_path {
        FileManager::write_json_atomic(path, output)?;
        info!("Wrote {:?}", path);
    }

    Ok(())
}

async fn run_batch(
    controller: &Controller,
    poem_ids: &[String],
    target_language: Language,
    mode: WorkflowMode,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let outcomes = controller.run_batch(poem_ids, target_language, mode).await;
    let mut failed = 0usize;

    for (poem_id, outcome) in &outcomes {
        match outcome {
            Ok(output) => {
                let id = controller.save(output).await?;
                info!("Poem '{}': {} (saved as {})", poem_id, output.summary(), id);
                if let Some(dir) = &output_dir {
                    let path = FileManager::generate_output_path(poem_id, dir, target_language);
                    FileManager::write_json_atomic(&path, output)?;
                }
            }
            Err(_) => failed += 1,
        }
    }

    if failed > 0 {
        return Err(anyhow!("{} of {} poem(s) failed", failed, outcomes.len()));
    }
    Ok(())
}

fn parse_variables(vars: &[String]) -> Result<BTreeMap<String, Value>> {
    vars.iter()
        .map(|pair| {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| anyhow!("Invalid variable '{}', expected KEY=VALUE", pair))?;
            Ok((key.trim().to_string(), Value::String(value.to_string())))
        })
        .collect()
}

/// Placeholder values so any workflow template renders in a preview
fn preview_defaults() -> BTreeMap<String, Value> {
    [
        ("original_poem", "<original poem>"),
        ("source_lang", "<source language>"),
        ("target_lang", "<target language>"),
        ("poet_name", "<poet>"),
        ("poem_title", "<title>"),
        ("background_briefing", "<briefing>"),
        ("initial_translation", "<initial translation>"),
        ("initial_translation_notes", "<translator notes>"),
        ("editor_suggestions", "<editor suggestions>"),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
    .collect()
}

fn open_repository(path: Option<&Path>) -> Result<Repository> {
    let db = match path {
        Some(path) => DatabaseConnection::new(path)?,
        None => DatabaseConnection::new_default()?,
    };
    Ok(Repository::new(db))
}
