use clap::Parser;
use colored::*;
use eyre::{Context, Result, eyre};
use log::info;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use ouroboros::compiler::CommandToolchain;
use ouroboros::config::Config;
use ouroboros::detection::{NeedDetector, ToolNeed};
use ouroboros::llm::{AnthropicClient, AnthropicConfig, LlmClient, UnavailableClient};
use ouroboros::ouroboros::{GenerationOutcome, GenerationRequest, LoopStatsSnapshot, Ouroboros, ToolSynthesizer};
use ouroboros::registry::DirectoryRegistry;

mod cli;

use cli::Cli;
use cli::commands::Commands;

type SharedLlm = Arc<dyn LlmClient>;

fn setup_logging() -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ouroboros")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("ouroboros.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

/// Cancel in-flight model and toolchain calls on Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

/// Model client for detection; without one, detection degrades to heuristics
fn detection_client(config: &Config, offline: bool) -> SharedLlm {
    if offline {
        return Arc::new(UnavailableClient::new("offline mode"));
    }
    match AnthropicClient::new(AnthropicConfig::from(&config.llm)) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            log::warn!("No language model available, using heuristics: {}", e);
            Arc::new(UnavailableClient::new(e.to_string()))
        }
    }
}

async fn run_application(cli: &Cli, config: Arc<Config>) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
        println!("  Tools directory: {}", config.tools.dir.display());
    }

    let cancel = cancel_on_ctrl_c();

    match &cli.command {
        Commands::Detect {
            input,
            prior_failure,
            offline,
        } => handle_detect_command(cli, config, input, prior_failure.as_deref(), *offline, &cancel).await,
        Commands::Generate {
            name,
            source,
            purpose,
            priority,
            confidence,
            dry_run,
        } => {
            let source_code = read_source(source)?;
            let request = GenerationRequest::new(name, purpose, source_code)
                .with_priority(*priority)
                .with_confidence(*confidence)
                .with_dry_run(*dry_run || config.tools.dry_run);
            handle_generate_command(cli, config, request, &cancel).await
        }
        Commands::Synthesize {
            input,
            prior_failure,
            dry_run,
        } => handle_synthesize_command(cli, config, input, prior_failure.as_deref(), *dry_run, &cancel).await,
        Commands::Tools => handle_tools_command(cli, &config),
    }
}

fn read_source(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut source = String::new();
        std::io::stdin()
            .read_to_string(&mut source)
            .context("Failed to read source from stdin")?;
        return Ok(source);
    }
    fs::read_to_string(path).context(format!("Failed to read source file {}", path.display()))
}

async fn handle_detect_command(
    cli: &Cli,
    config: Arc<Config>,
    input: &str,
    prior_failure: Option<&str>,
    offline: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    info!("Detecting tool need for: {}", input);
    let registry = Arc::new(DirectoryRegistry::new(&config.tools.dir));
    let detector = NeedDetector::new(&config, Arc::new(detection_client(&config, offline)), registry)?;

    let need = detector.detect(input, prior_failure.unwrap_or(""), cancel).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&need)?);
        return Ok(());
    }
    match need {
        Some(need) => print_need(&need),
        None => println!("{}", "No tool need detected".green()),
    }
    Ok(())
}

async fn handle_generate_command(
    cli: &Cli,
    config: Arc<Config>,
    request: GenerationRequest,
    cancel: &CancellationToken,
) -> Result<()> {
    info!("Generating tool {} from source", request.name);
    let toolchain = CommandToolchain::from_config(&config.toolchain);
    let ouroboros = Ouroboros::new(config, toolchain)?;

    let outcome = ouroboros.generate_tool_from_code(request, cancel).await?;
    report_outcome(cli, &outcome, &ouroboros.stats())
}

async fn handle_synthesize_command(
    cli: &Cli,
    config: Arc<Config>,
    input: &str,
    prior_failure: Option<&str>,
    dry_run: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    info!("Synthesizing tool for: {}", input);
    let llm: SharedLlm = Arc::new(
        AnthropicClient::new(AnthropicConfig::from(&config.llm)).context("Synthesis needs a language model")?,
    );
    let llm = Arc::new(llm);

    let registry = Arc::new(DirectoryRegistry::new(&config.tools.dir));
    let detector = NeedDetector::new(&config, llm.clone(), registry)?;
    let Some(need) = detector.detect(input, prior_failure.unwrap_or(""), cancel).await? else {
        println!("{}", "No tool need detected".green());
        return Ok(());
    };
    if !cli.json {
        print_need(&need);
    }

    let toolchain = CommandToolchain::from_config(&config.toolchain);
    let ouroboros = Arc::new(Ouroboros::new(config.clone(), toolchain)?);
    let mut synthesizer = ToolSynthesizer::new(llm, ouroboros.clone())?;
    if dry_run {
        synthesizer = synthesizer.with_dry_run(true);
    }

    let outcome = synthesizer.synthesize(&need, cancel).await?;
    report_outcome(cli, &outcome, &ouroboros.stats())
}

fn handle_tools_command(cli: &Cli, config: &Config) -> Result<()> {
    let manifests = DirectoryRegistry::new(&config.tools.dir).manifests();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&manifests)?);
        return Ok(());
    }
    if manifests.is_empty() {
        println!("No tools registered in {}", config.tools.dir.display());
        return Ok(());
    }
    println!("{} ({})", "Registered tools".cyan(), config.tools.dir.display());
    for tool in manifests {
        println!(
            "  {:<24} priority={:.2} confidence={:.2}  {}",
            tool.name.bold(),
            tool.priority,
            tool.confidence,
            tool.purpose
        );
    }
    Ok(())
}

fn print_need(need: &ToolNeed) {
    println!("{} {}", "Tool need:".cyan(), need.name.bold());
    println!("  Purpose:    {}", need.purpose);
    println!("  Category:   {}", need.category);
    println!("  Types:      {} -> {}", need.input_type, need.output_type);
    println!("  Triggers:   {}", need.triggers.join(", "));
    println!("  Priority:   {:.2}", need.priority);
    println!("  Confidence: {:.2}", need.confidence);
    if need.is_heuristic() {
        println!("  {}", "(heuristic fallback)".yellow());
    }
    if !need.reasoning.is_empty() {
        println!("  Reasoning:  {}", need.reasoning);
    }
}

fn report_outcome(cli: &Cli, outcome: &GenerationOutcome, stats: &LoopStatsSnapshot) -> Result<()> {
    if cli.json {
        let report = serde_json::json!({ "outcome": outcome, "stats": stats });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if outcome.success {
        match &outcome.artifact_path {
            Some(path) => println!("{} {}", "Registered:".green(), path.display()),
            None => println!("{}", "Dry run passed".green()),
        }
    } else {
        println!("{} {}", "Rejected:".red(), outcome.error_message);
    }

    if cli.is_verbose() && !cli.json {
        println!(
            "  Stats: attempts={} safety={} compile={} successes={}",
            stats.total_attempts, stats.safety_violations, stats.compilation_failures, stats.successes
        );
    }

    if outcome.success {
        Ok(())
    } else {
        Err(eyre!("tool was not registered"))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Setup logging first
    setup_logging().context("Failed to setup logging")?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.tools_dir {
        config.tools.dir = dir.clone();
    }
    config.validate().context("Invalid configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, Arc::new(config)).await.context("Application failed")?;

    Ok(())
}
