//! SREX - reliability requirements to observability artifacts
//!
//! The `srex` command drives the generation pipeline and its offline tools.
//!
//! ## Commands
//!
//! - `generate`: five-stage run producing an integrated document
//! - `single`: one stage under a single contract
//! - `recover`: recover, normalize and validate a saved reply
//! - `validate`: check a document against a contract

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, Level};

use srex_core::config::{ENV_MODEL, ENV_OLLAMA_URL};
use srex_core::{
    ArtifactDirObserver, Contract, GenerationContext, InstructionRenderer, OllamaGenerator,
    PipelineOrchestrator, ScriptedGenerator, SrexConfig, StageRunner, StaticIndicatorSource,
    TemplateRenderer, TextGenerator,
};

#[derive(Parser)]
#[command(name = "srex")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Generate and validate SLIs, SLOs and alerts", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// TOML configuration file
    #[arg(long, global = true, env = "SREX_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GenerationArgs {
    /// Generation context (JSON)
    #[arg(short, long)]
    input: PathBuf,

    /// Model name passed to the generation service
    #[arg(long, env = ENV_MODEL)]
    model: Option<String>,

    /// Base URL of the generation service
    #[arg(long, env = ENV_OLLAMA_URL)]
    base_url: Option<String>,

    /// Replay replies from this directory (name order) instead of calling the service
    #[arg(long)]
    replies: Option<PathBuf>,

    /// Live indicator readings (JSON)
    #[arg(long)]
    indicators: Option<PathBuf>,

    /// Write raw replies and documents under this directory
    #[arg(long)]
    artifacts_dir: Option<PathBuf>,

    /// Prompt template with {{ variable }} slots
    #[arg(long)]
    template: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run all five stages and print the integrated document
    Generate {
        #[command(flatten)]
        args: GenerationArgs,
    },

    /// Run a single stage under one contract
    Single {
        #[command(flatten)]
        args: GenerationArgs,

        /// Output contract
        #[arg(short, long, default_value = "integrated")]
        contract: String,
    },

    /// Recover a saved reply offline
    Recover {
        /// Raw reply file (stdin when omitted)
        #[arg(long)]
        raw: Option<PathBuf>,

        /// Generation context (JSON)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output contract
        #[arg(short, long, default_value = "integrated")]
        contract: String,

        /// Write the result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a document against a contract
    Validate {
        /// Document to check (JSON)
        #[arg(short, long)]
        document: PathBuf,

        /// Output contract
        #[arg(short, long, default_value = "integrated")]
        contract: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    srex_core::init_tracing(cli.json, level);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate { args } => cmd_generate(config, &args).await?,
        Commands::Single { args, contract } => cmd_single(config, &args, &contract).await?,
        Commands::Recover {
            raw,
            input,
            contract,
            output,
        } => cmd_recover(
            &config,
            raw.as_deref(),
            input.as_deref(),
            &contract,
            output.as_deref(),
        )?,
        Commands::Validate { document, contract } => {
            if !cmd_validate(&document, &contract)? {
                return Ok(ExitCode::FAILURE);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn load_config(path: Option<&Path>) -> Result<SrexConfig> {
    match path {
        Some(path) => SrexConfig::load(path)
            .with_context(|| format!("Failed to load config {:?}", path)),
        None => SrexConfig::from_env().context("Invalid configuration in environment"),
    }
}

fn read_context(path: &Path) -> Result<GenerationContext> {
    let text = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parse generation context {:?}", path))
}

fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let content = serde_json::to_string_pretty(value).context("serialize result")?;
    match output {
        Some(path) => {
            std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
            info!(path = %path.display(), "result written");
        }
        None => println!("{}", content),
    }
    Ok(())
}

fn build_orchestrator(mut config: SrexConfig, args: &GenerationArgs) -> Result<PipelineOrchestrator> {
    if let Some(url) = &args.base_url {
        config.generator.base_url = url.clone();
    }
    if let Some(model) = &args.model {
        config.generator.model = model.clone();
    }
    config.validate().context("Invalid configuration")?;

    let generator: Arc<dyn TextGenerator> = match &args.replies {
        Some(dir) => Arc::new(
            ScriptedGenerator::from_dir(dir)
                .with_context(|| format!("Failed to load replies from {:?}", dir))?,
        ),
        None => Arc::new(
            OllamaGenerator::new(&config.generator).context("Failed to build HTTP client")?,
        ),
    };

    let mut orchestrator = PipelineOrchestrator::new(generator, &config);
    if let Some(model) = &args.model {
        orchestrator = orchestrator.with_model(model.clone());
    }
    if let Some(path) = &args.template {
        let renderer = TemplateRenderer::from_file(path)
            .with_context(|| format!("Failed to read template {:?}", path))?;
        orchestrator = orchestrator.with_renderer(Arc::new(renderer));
    }
    if let Some(path) = &args.indicators {
        let source = StaticIndicatorSource::from_file(path)
            .with_context(|| format!("Failed to load indicators from {:?}", path))?;
        info!(readings = source.len(), "loaded live indicators");
        orchestrator = orchestrator.with_indicator_source(Arc::new(source));
    }
    if let Some(dir) = &args.artifacts_dir {
        orchestrator = orchestrator.with_observer(Arc::new(ArtifactDirObserver::new(dir)));
    }
    Ok(orchestrator)
}

async fn cmd_generate(config: SrexConfig, args: &GenerationArgs) -> Result<()> {
    let ctx = read_context(&args.input)?;
    let orchestrator = build_orchestrator(config, args)?;
    let run = orchestrator.run(ctx).await.context("Pipeline run failed")?;

    info!(
        run_id = %run.run_id,
        confidence = %run.confidence,
        valid = run.validation.passed(),
        "pipeline complete"
    );
    emit(&run, args.output.as_deref())
}

async fn cmd_single(config: SrexConfig, args: &GenerationArgs, contract: &str) -> Result<()> {
    let contract = Contract::by_name(contract)?;
    let ctx = read_context(&args.input)?;
    let orchestrator = build_orchestrator(config, args)?;
    let run = orchestrator
        .run_single(ctx, contract)
        .await
        .context("Generation failed")?;

    info!(
        run_id = %run.run_id,
        strategy = %run.outcome.strategy,
        confidence = %run.outcome.confidence,
        "stage complete"
    );
    emit(&run, args.output.as_deref())
}

fn cmd_recover(
    config: &SrexConfig,
    raw: Option<&Path>,
    input: Option<&Path>,
    contract: &str,
    output: Option<&Path>,
) -> Result<()> {
    let contract = Contract::by_name(contract)?;
    let text = match raw {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read reply from stdin")?;
            buf
        }
    };
    let ctx = match input {
        Some(path) => read_context(path)?,
        None => GenerationContext::new("offline", ""),
    };

    let runner = StageRunner::new(
        Arc::new(ScriptedGenerator::default()),
        Arc::new(InstructionRenderer),
        config,
    );
    let outcome = runner.recover_output("offline", contract.name(), contract, &ctx, text, false);
    info!(
        strategy = %outcome.strategy,
        confidence = %outcome.confidence,
        valid = outcome.validation.passed(),
        "reply recovered"
    );
    emit(&outcome, output)
}

/// Prints the validation result; returns whether the document passed.
fn cmd_validate(document: &Path, contract: &str) -> Result<bool> {
    let contract = Contract::by_name(contract)?;
    let text = std::fs::read_to_string(document).with_context(|| format!("read {:?}", document))?;
    let value: Value =
        serde_json::from_str(&text).with_context(|| format!("parse document {:?}", document))?;

    let result = contract.validate_value(&value);
    emit(&result, None)?;
    if !result.passed() {
        info!(errors = result.error_count(), contract = contract.name(), "validation failed");
    }
    Ok(result.passed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_generate() {
        let cli = Cli::try_parse_from([
            "srex",
            "--json",
            "generate",
            "--input",
            "ctx.json",
            "--replies",
            "replies",
        ])
        .unwrap();
        assert!(cli.json);
        match cli.command {
            Commands::Generate { args } => {
                assert_eq!(args.input, PathBuf::from("ctx.json"));
                assert_eq!(args.replies, Some(PathBuf::from("replies")));
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn test_validate_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, r#"{"indicators": []}"#).unwrap();
        assert!(!cmd_validate(&path, "indicators").unwrap());
        assert!(cmd_validate(&path, "bogus").is_err());
    }

    #[tokio::test]
    async fn test_generate_from_replies() {
        let dir = tempfile::tempdir().unwrap();
        let replies = dir.path().join("replies");
        std::fs::create_dir(&replies).unwrap();
        for (i, reply) in [
            r#"{"indicators": [{"name": "availability_api", "type": "availability"}]}"#,
            r#"{"objectives": [{"name": "api-availability", "indicator": "availability_api", "target": 99.9, "window": "30d"}]}"#,
            r#"{"alerts": [{"name": "ApiDown", "severity": "critical"}]}"#,
            r#"{"suggestions": [{"metric": "availability_api", "recommendation": "Keep error budget burn under 2x"}], "explanation": "Availability is the main risk."}"#,
            "{}",
        ]
        .iter()
        .enumerate()
        {
            std::fs::write(replies.join(format!("{:02}.txt", i + 1)), reply).unwrap();
        }
        let input = dir.path().join("ctx.json");
        std::fs::write(&input, r#"{"component": "api"}"#).unwrap();
        let output = dir.path().join("out.json");

        let args = GenerationArgs {
            input,
            model: None,
            base_url: None,
            replies: Some(replies),
            indicators: None,
            artifacts_dir: None,
            template: None,
            output: Some(output.clone()),
        };
        cmd_generate(SrexConfig::default(), &args).await.unwrap();

        let run: Value = serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
        assert_eq!(run["final_document"]["alerts"][0]["name"], "ApiDown");
        assert_eq!(run["validation"]["valid"], true);
    }
}
