mod cli;

use anyhow::{Context, Result};
use clawhands_guard::{resolve_path, AuthorizationDecision, AuthorizationRequest};
use clawhands_runtime::{Runtime, RuntimeConfig};
use cli::{Cli, Command, GuardArgs, USAGE};
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

const LOG_ENV: &str = "CLAWHANDS_LOG";

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse(std::env::args().skip(1))?;
    if cli.command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    let config_path = RuntimeConfig::locate(cli.config.as_deref());
    let config = RuntimeConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    let runtime = Runtime::new(config).context("Failed to start runtime")?;

    match cli.command {
        Command::CheckPath { path, guard } => check_path(&runtime, &path, &guard),
        Command::CheckCommand { command, guard } => check_command(&runtime, &command, &guard),
        Command::Resolve { model, provider } => resolve(&runtime, &model, provider.as_deref()),
        Command::Tools => tools(&runtime).await,
        Command::Help => Ok(()),
    }
}

fn init_logging() {
    let filter = std::env::var(LOG_ENV)
        .ok()
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn working_directory(guard: &GuardArgs) -> Result<Option<PathBuf>> {
    guard
        .working_directory
        .as_ref()
        .map(|dir| {
            dir.canonicalize()
                .with_context(|| format!("Working directory {} not found", dir.display()))
        })
        .transpose()
}

fn request<'a>(
    guard: &'a GuardArgs,
    default_key: &'a str,
    working_directory: Option<&'a Path>,
) -> AuthorizationRequest<'a> {
    let operation_key = guard.operation_key.as_deref().unwrap_or(default_key);
    let mut request =
        AuthorizationRequest::new(operation_key).user_initiated(guard.user_initiated);
    if let Some(session) = &guard.session_id {
        request = request.session(session);
    }
    if let Some(dir) = working_directory {
        request = request.working_directory(dir);
    }
    request
}

fn print_decision(decision: &AuthorizationDecision, extra: serde_json::Value) -> Result<()> {
    let mut out = json!({
        "decision": decision.kind(),
        "reason": decision.reason(),
    });
    if let (Some(out), Some(extra)) = (out.as_object_mut(), extra.as_object()) {
        out.extend(extra.clone());
    }
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn check_path(runtime: &Runtime, path: &str, guard: &GuardArgs) -> Result<()> {
    let wd = working_directory(guard)?;
    let request = request(guard, "file_operations.read_file", wd.as_deref());
    let decision = runtime.guard().check_path(path, &request);

    let base = wd.as_deref().and_then(|dir| dir.to_str());
    print_decision(
        &decision,
        json!({ "resolved_path": resolve_path(path, base).display().to_string() }),
    )
}

fn check_command(runtime: &Runtime, command: &str, guard: &GuardArgs) -> Result<()> {
    let wd = working_directory(guard)?;
    let request = request(guard, "run_command", wd.as_deref());
    let decision = runtime.guard().check_command(command, &request);
    print_decision(&decision, json!({}))
}

fn resolve(runtime: &Runtime, model: &str, provider: Option<&str>) -> Result<()> {
    let resolved = match provider {
        Some(id) => runtime.router().resolve_explicit(id, model),
        None => runtime.router().resolve(model),
    }
    .with_context(|| format!("No route for model '{}'", model))?;

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "model": model,
            "provider_id": resolved.provider_id,
        }))?
    );
    Ok(())
}

async fn tools(runtime: &Runtime) -> Result<()> {
    let schemas = runtime.registry().schemas().await;
    println!("{}", serde_json::to_string_pretty(&schemas)?);
    Ok(())
}
