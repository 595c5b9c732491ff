// repotools-cli/src/main.rs
mod models;
mod rendering;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::*;
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{
    fmt::{self, time::LocalTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use repotools_core::{
    load_config, Invoker, Registry, ToolContext, ToolError, ToolsConfig, CONFIG_FILENAME,
};

use crate::models::cli::{Cli, Commands};

const LOG_FILE_NAME: &str = "repotools.log";

/// Config and root for this run. An explicit `--root` skips the upward search.
fn resolve_project(root: Option<&Path>) -> Result<(ToolsConfig, PathBuf)> {
    match root {
        Some(root) => {
            let root = fs::canonicalize(root)
                .with_context(|| format!("Project root {:?} is not accessible", root))?;
            let config_path = root.join(CONFIG_FILENAME);
            if !config_path.is_file() {
                info!("No {} in {:?}; using defaults.", CONFIG_FILENAME, root);
                return Ok((ToolsConfig::default(), root));
            }
            let content = fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read project config file: {:?}", config_path))?;
            let config = ToolsConfig::from_toml_str(&content)
                .with_context(|| format!("Invalid configuration in {:?}", config_path))?;
            Ok((config, root))
        }
        None => {
            let cwd = env::current_dir().context("Failed to get current directory")?;
            load_config(&cwd)
        }
    }
}

/// Merges `--json` and `-p key=value` pairs into one parameter map.
///
/// Pair values are read as JSON when they parse and as plain strings
/// otherwise, so `-p coverage=true` is a boolean and `-p app=docs` a string.
fn parse_params(json: Option<&str>, pairs: &[String]) -> Result<Map<String, Value>> {
    let mut params = match json {
        Some(raw) => match serde_json::from_str::<Value>(raw)
            .with_context(|| format!("--json is not valid JSON: {}", raw))?
        {
            Value::Object(map) => map,
            other => bail!("--json must be a JSON object, got {}", other),
        },
        None => Map::new(),
    };
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Parameter '{}' is not in KEY=VALUE form", pair))?;
        if key.is_empty() {
            bail!("Parameter '{}' has an empty key", pair);
        }
        let value: Value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}

fn print_tool_error(e: &ToolError) {
    error!(kind = e.kind().as_str(), "Tool call failed: {}", e);
    eprintln!(
        "{} {}",
        format!("Error [{}]:", e.kind().as_str()).red(),
        e
    );
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let (config, project_root) = resolve_project(cli.root.as_deref())?;
    info!(root = ?project_root, project = %config.project_name, "Resolved project");

    let ctx = ToolContext::new(Invoker::new(project_root.clone()), config);
    let registry = match Registry::with_builtin_tools(ctx) {
        Ok(registry) => registry,
        Err(e) => {
            print_tool_error(&e);
            return Ok(ExitCode::FAILURE);
        }
    };

    match cli.command {
        Commands::List => {
            rendering::print_tool_list(&registry)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Describe { tool } => match registry.get(&tool) {
            Some(descriptor) => {
                print!("{}", rendering::describe(descriptor));
                Ok(ExitCode::SUCCESS)
            }
            None => {
                print_tool_error(&ToolError::UnknownTool(tool));
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Call { tool, params, json } => {
            let params = parse_params(json.as_deref(), &params)?;
            let supplied = Value::Object(params.clone());
            debug!(tool = %tool, params = %supplied, "Calling tool");
            match registry.dispatch(&tool, params).await {
                Ok(response) => {
                    rendering::print_response(&response)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    print_tool_error(&e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    colored::control::set_override(true);

    // Children inherit whatever .env provides (AWS profile, tokens).
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // --- Logging Setup ---
    let default_level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(default_level.into()));

    let log_dir = match dirs::cache_dir()
        .or_else(dirs::runtime_dir)
        .or_else(|| Some(env::temp_dir()))
        .map(|d| d.join("repotools"))
    {
        Some(dir) => dir,
        None => {
            eprintln!("{}", "Error: Could not determine a suitable directory for log files.".red());
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = fs::create_dir_all(&log_dir) {
        eprintln!("{} Failed to create log directory {}: {}", "Error:".red(), log_dir.display(), e);
        return ExitCode::FAILURE;
    }
    let log_path = log_dir.join(LOG_FILE_NAME);

    let file_appender = tracing_appender::rolling::never(&log_dir, LOG_FILE_NAME);
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let time_format_desc = match time::format_description::parse(
        "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]",
    ) {
        Ok(desc) => desc,
        Err(e) => {
            eprintln!("{} Failed to parse time format: {}", "Error:".red(), e);
            return ExitCode::FAILURE;
        }
    };
    let local_timer = LocalTime::new(time_format_desc);

    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(local_timer.clone())
        .with_target(false)
        .with_level(true);
    let file_layer = fmt::layer()
        .with_writer(non_blocking_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_timer(local_timer);

    if let Err(e) = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
    {
        eprintln!("{} Failed to initialize logging: {}", "Error:".red(), e);
        return ExitCode::FAILURE;
    }
    colored::control::unset_override();

    info!(
        "Logging initialized. Level determined by RUST_LOG or -v flags (default: {}). Logging to stderr and {}",
        default_level,
        log_path.display()
    );
    // --- End Logging Setup ---

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("Operation failed: {:?}", e);
            eprintln!("{} {:#}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}
