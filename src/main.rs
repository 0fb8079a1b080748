use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use questionqc::{
    GeminiClient, GeminiConfig, QuestionService, Stage, StageAgent, StageSettings, VersionStore,
    Workflow,
};

#[derive(Parser)]
#[command(name = "questionqc")]
#[command(author, version, about = "AI QC and enhancement pipeline for question banks", long_about = None)]
struct Cli {
    /// Version table (CSV)
    #[arg(long, env = "QC_TABLE_PATH", default_value = "question_versions.csv", global = true)]
    table: PathBuf,

    /// Directory with <stage>_prompt.txt templates (built-in prompts if omitted)
    #[arg(long, global = true)]
    prompts_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a question through correctness, language, improvement and metadata stages
    Process {
        /// Question text
        #[arg(short, long)]
        text: String,

        /// Author tag stored on the submitted version
        #[arg(short, long)]
        author: String,

        /// Temperature for the correctness stage
        #[arg(long, default_value_t = Stage::Correctness.default_temperature())]
        correctness_temperature: f32,

        /// Temperature for the language stage
        #[arg(long, default_value_t = Stage::Language.default_temperature())]
        language_temperature: f32,

        /// Temperature for the improvement stage
        #[arg(long, default_value_t = Stage::Improvement.default_temperature())]
        improvement_temperature: f32,

        /// Temperature for the metadata stage
        #[arg(long, default_value_t = Stage::Metadata.default_temperature())]
        metadata_temperature: f32,
    },

    /// Print every stored version of a question as JSON
    Versions {
        /// Question identifier
        question_id: String,
    },

    /// Write the raw version table
    Export {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let store = VersionStore::open(&cli.table)
        .with_context(|| format!("Failed to open version table {:?}", cli.table))?;

    match cli.command {
        Commands::Process {
            text,
            author,
            correctness_temperature,
            language_temperature,
            improvement_temperature,
            metadata_temperature,
        } => {
            let settings = StageSettings {
                correctness_temperature,
                language_temperature,
                improvement_temperature,
                metadata_temperature,
            };
            process_question(store, &text, &author, cli.prompts_dir, settings).await
        }
        Commands::Versions { question_id } => {
            let service = QuestionService::read_only(store);
            let versions = service.versions(&question_id)?;
            println!("{}", serde_json::to_string_pretty(&versions)?);
            Ok(())
        }
        Commands::Export { output } => export_table(&QuestionService::read_only(store), output),
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn process_question(
    store: VersionStore,
    text: &str,
    author: &str,
    prompts_dir: Option<PathBuf>,
    settings: StageSettings,
) -> Result<()> {
    let client = Arc::new(GeminiClient::new(GeminiConfig::from_env()?));
    info!("Using Gemini model {}", client.model());

    let agents = StageAgent::for_all_stages(client, &settings, prompts_dir.as_deref())
        .context("Failed to load prompt templates")?;
    let workflow = Workflow::new(agents)?;
    let service = QuestionService::new(workflow, store);

    let result = service
        .process(text, author)
        .await
        .context("Failed to process question")?;

    for failure in &result.failures {
        warn!(
            "Stage {} degraded ({:?}): {}",
            failure.stage, failure.kind, failure.message
        );
    }
    info!(
        "Stored version {} for question {}",
        result.version_number, result.question_id
    );

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn export_table(service: &QuestionService, output: Option<PathBuf>) -> Result<()> {
    let raw = service.export().context("Failed to read version table")?;
    match output {
        Some(path) => {
            std::fs::write(&path, raw)
                .with_context(|| format!("Failed to write file: {:?}", path))?;
            info!("Version table written to {:?}", path);
        }
        None => print!("{}", raw),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_of(cli: Cli) -> StageSettings {
        match cli.command {
            Commands::Process {
                correctness_temperature,
                language_temperature,
                improvement_temperature,
                metadata_temperature,
                ..
            } => StageSettings {
                correctness_temperature,
                language_temperature,
                improvement_temperature,
                metadata_temperature,
            },
            _ => panic!("expected process command"),
        }
    }

    #[test]
    fn test_temperature_flags_default_to_stage_defaults() {
        let cli = Cli::try_parse_from(["questionqc", "process", "-t", "Q?", "-a", "alice"]).unwrap();
        assert_eq!(settings_of(cli), StageSettings::default());
    }

    #[test]
    fn test_prompts_dir_accepted_after_subcommand() {
        let cli = Cli::try_parse_from([
            "questionqc",
            "process",
            "-t",
            "Q?",
            "-a",
            "alice",
            "--prompts-dir",
            "prompts",
            "--language-temperature",
            "0.9",
        ])
        .unwrap();
        assert_eq!(cli.prompts_dir, Some(PathBuf::from("prompts")));
        assert_eq!(settings_of(cli).language_temperature, 0.9);
    }

    #[test]
    fn test_prompts_dir_accepted_before_subcommand() {
        let cli = Cli::try_parse_from(["questionqc", "--prompts-dir", "p", "versions", "abc"]).unwrap();
        assert_eq!(cli.prompts_dir, Some(PathBuf::from("p")));
        assert!(matches!(cli.command, Commands::Versions { .. }));
    }
}
