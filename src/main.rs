use clap::Parser;
use colored::*;
use eyre::{Context, Result, bail};
use log::info;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

mod cli;
mod config;

use cli::Cli;
use cli::commands::Commands;
use config::Config;
use tabpilot::llm::{AiClient, StreamSink, StreamUpdate};
use tabpilot::tools::{
    DetachedBrowser, EventNotifier, ToolRegistry, check_plan, load_plan, register_builtin_tools, run_plan,
};

fn setup_logging(default_level: &str) -> Result<PathBuf> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tabpilot")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("tabpilot.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(log_file)
}

fn builtin_registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    register_builtin_tools(&registry, Arc::new(DetachedBrowser));
    registry
}

async fn run_application(cli: &Cli, config: &Config) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        None => {
            println!("{}", "No command given; try `tabpilot --help`".yellow());
            Ok(())
        }
        Some(Commands::Send { text, system, no_stream }) => {
            handle_send_command(text, system.as_deref(), *no_stream, cli.is_verbose(), config).await
        }
        Some(Commands::Tools) => handle_tools_command(cli.is_verbose(), config),
        Some(Commands::ValidatePlan { file }) => handle_validate_plan_command(file),
        Some(Commands::RunPlan { file }) => handle_run_plan_command(file, cli.is_verbose(), config).await,
    }
}

async fn handle_send_command(
    text: &str,
    system: Option<&str>,
    no_stream: bool,
    verbose: bool,
    config: &Config,
) -> Result<()> {
    let model_config = config.llm.to_model_configuration()?;
    let client = AiClient::new(model_config).context("Failed to create AI client")?;
    info!("Sending prompt ({} chars) via {}", text.len(), client.kind());

    if no_stream {
        let response = client
            .send_message(text, None, system)
            .await
            .context("Request failed")?;
        println!("{}", response.content);
        if verbose {
            let usage = client.total_usage();
            println!(
                "{} prompt={} completion={} total={}",
                "Usage:".cyan(),
                usage.prompt_tokens,
                usage.completion_tokens,
                usage.total_tokens
            );
        }
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    let mut print_update = |update: StreamUpdate| match update {
        StreamUpdate::Delta { content, .. } => {
            let _ = write!(stdout, "{}", content);
            let _ = stdout.flush();
        }
        StreamUpdate::Error { error } => eprintln!("\n{} {}", "Stream error:".red(), error),
        StreamUpdate::Done => {
            let _ = writeln!(stdout);
        }
    };
    let sink: StreamSink<'_> = &mut print_update;

    let response = client
        .send_message(text, Some(sink), system)
        .await
        .context("Streaming request failed")?;
    info!("Stream finished with {} chars", response.content.len());
    Ok(())
}

fn handle_tools_command(verbose: bool, config: &Config) -> Result<()> {
    let registry = builtin_registry();

    if verbose {
        let policy = config.tools.retry_policy();
        println!(
            "{} max_retries={} base_delay={}ms history_limit={}",
            "Retry:".cyan(),
            policy.max_retries,
            policy.base_delay.as_millis(),
            config.tools.history_limit
        );
        for def in registry.definitions() {
            println!(
                "{} readonly={} instant={} confirm={}",
                def.name.green(),
                def.flags.readonly,
                def.flags.is_instant,
                def.flags.requires_confirmation
            );
        }
    }

    let schemas = serde_json::to_string_pretty(&registry.function_schemas())?;
    println!("{}", schemas);
    Ok(())
}

fn handle_validate_plan_command(path: &Path) -> Result<()> {
    let plan = load_plan(path).context(format!("Failed to load plan {}", path.display()))?;
    let registry = builtin_registry();
    info!("Validating plan {} with {} steps", path.display(), plan.len());

    let mut failures = 0;
    for (index, (step, outcome)) in plan.iter().zip(check_plan(&registry, &plan)).enumerate() {
        match outcome {
            Ok(()) => println!("{} step {}: {}", "✓".green(), index, step.tool),
            Err(e) => {
                failures += 1;
                println!("{} step {}: {}", "✗".red(), index, e);
            }
        }
    }

    if failures > 0 {
        bail!("{} of {} steps are invalid", failures, plan.len());
    }
    println!("{} {} steps valid", "Plan OK:".green(), plan.len());
    Ok(())
}

fn progress_notifier() -> EventNotifier {
    EventNotifier::new()
        .on_tool_start(|e| {
            println!("{} {}", "→".cyan(), e.message);
            Ok(())
        })
        .on_tool_progress(|e| {
            println!("{} {}", "↻".yellow(), e.message);
            Ok(())
        })
        .on_tool_error(|e| {
            println!("{} {}", "✗".red(), e.message);
            Ok(())
        })
}

async fn handle_run_plan_command(path: &Path, verbose: bool, config: &Config) -> Result<()> {
    let plan = load_plan(path).context(format!("Failed to load plan {}", path.display()))?;
    let orchestrator = config.tools.orchestrator(builtin_registry(), progress_notifier());
    info!("Running plan {} with {} steps", path.display(), plan.len());

    let outcome = run_plan(&orchestrator, &plan).await;
    if verbose {
        println!("{} {} executions recorded", "History:".cyan(), orchestrator.history_len());
    }

    let results = outcome.context("Plan failed")?;
    for (index, step) in results.iter().enumerate() {
        let value = step.result.clone().unwrap_or_default();
        println!("{} step {} ({}): {}", "✓".green(), index, step.tool, value);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging once the configured level is known
    setup_logging(config.log_level.as_deref().unwrap_or("info")).context("Failed to setup logging")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn plan_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_builtin_registry_has_catalog() {
        assert_eq!(builtin_registry().len(), 4);
    }

    #[test]
    fn test_validate_plan_ok() {
        let file = plan_file(
            r#"[
                {"tool": "search", "args": {"query": "rust"}},
                {"tool": "open_tab", "args": {"url": "https://docs.rs"}},
                {"tool": "extract_page_content", "args": {"tab_id": 1}}
            ]"#,
        );
        assert!(handle_validate_plan_command(file.path()).is_ok());
    }

    #[test]
    fn test_validate_plan_reports_bad_steps() {
        let file = plan_file(
            r#"[
                {"tool": "search"},
                {"tool": "close_tab", "args": {}}
            ]"#,
        );
        let err = handle_validate_plan_command(file.path()).unwrap_err();
        assert!(err.to_string().contains("2 of 2 steps are invalid"));
    }

    #[test]
    fn test_validate_plan_rejects_bad_json() {
        let file = plan_file("{\"tool\": \"search\"}");
        assert!(handle_validate_plan_command(file.path()).is_err());
    }

    fn no_retry_config() -> Config {
        let mut config = Config::default();
        config.tools.max_retries = 0;
        config.tools.retry_delay_ms = 0;
        config
    }

    #[tokio::test]
    async fn test_run_plan_registers_tool() {
        let file = plan_file(
            r#"[
                {"tool": "generate_tool", "args": {"name": "docs", "description": "", "target_tool": "search"}}
            ]"#,
        );
        assert!(handle_run_plan_command(file.path(), true, &no_retry_config()).await.is_ok());
    }

    #[tokio::test]
    async fn test_run_plan_without_browser_fails() {
        let file = plan_file(r#"[{"tool": "search", "args": {"query": "rust"}}]"#);
        let err = handle_run_plan_command(file.path(), false, &no_retry_config())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("no browser attached"));
    }
}
