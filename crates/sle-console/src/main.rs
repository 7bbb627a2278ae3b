//! SLE console binary entrypoint.

use std::io;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use sle_console::cli::{Cli, Commands};
use sle_console::commands::execute;
use sle_console::output::OutputFormat;
use sle_console::terminal::TerminalView;
use sle_console::{ConsoleConfig, ConsoleContext};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if cli.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// File configuration with command-line overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<ConsoleConfig> {
    let mut config = match &cli.config {
        Some(path) => ConsoleConfig::from_file(path)?,
        None => ConsoleConfig::default(),
    };
    if let Some(url) = &cli.base_url {
        config = config.with_base_url(url.as_str());
    }
    if let Some(url) = &cli.ws_url {
        config = config.with_websocket_url(url.as_str());
    }
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let view = Arc::new(TerminalView::stdio(matches!(cli.command, Commands::Monitor)));
    let ctx = ConsoleContext::new(config, view.clone(), view.clone())?;
    view.set_resync_handle(ctx.resync_handle());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = io::stdout();
    execute(
        &cli.command,
        &ctx,
        &mut stdout,
        OutputFormat::new(cli.format),
        shutdown,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    #[test]
    fn flags_override_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"base_url = \"http://file:8080\"\nlog_capacity = 20\n")
            .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let cli = Cli::parse_from([
            "sle-console",
            "--config",
            path.as_str(),
            "--ws-url",
            "ws://flag:9000/websocket",
            "state",
        ]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.base_url, "http://file:8080");
        assert_eq!(config.websocket_url, "ws://flag:9000/websocket");
        assert_eq!(config.log_capacity, 20);
    }

    #[test]
    fn missing_config_file_fails() {
        let cli = Cli::parse_from(["sle-console", "--config", "/nonexistent/console.toml", "state"]);
        assert!(load_config(&cli).is_err());
    }

    #[tokio::test]
    async fn run_state_without_proxy_fails() {
        let cli = Cli::parse_from(["sle-console", "--base-url", "http://127.0.0.1:1", "state"]);
        assert!(run(cli).await.is_err());
    }

    #[tokio::test]
    async fn run_with_invalid_base_url_fails() {
        let cli = Cli::parse_from(["sle-console", "--base-url", "ws://wrong", "profiles"]);
        assert!(run(cli).await.is_err());
    }
}
