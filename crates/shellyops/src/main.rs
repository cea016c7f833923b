mod cli;
mod commands;
mod error;
mod output;

use clap::{CommandFactory, Parser, ValueEnum};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use shellyops_config::Overrides;
use shellyops_core::SyncManager;

use crate::cli::{Cli, Command, OutputFormat};
use crate::commands::Render;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Command::Completions(args) = &cli.command {
        clap_complete::generate(args.shell, &mut Cli::command(), "shellyops", &mut std::io::stdout());
        return Ok(());
    }

    let config = shellyops_config::load_config()?;
    if let Command::Config(args) = &cli.command {
        return commands::config_cmd::handle(args, &config, cli.global.quiet);
    }

    let format = match cli.global.output {
        Some(format) => format,
        None => <OutputFormat as ValueEnum>::from_str(&config.output, true).map_err(|_| CliError::Validation {
            field: "output".into(),
            reason: format!("unknown format '{}', expected table, json or yaml", config.output),
        })?,
    };
    let render = Render {
        format,
        quiet: cli.global.quiet,
        color: output::should_color(),
    };

    let overrides = Overrides {
        repo: cli.global.repo.clone(),
        timeout: cli.global.timeout,
        values: None,
    };
    let sync_config = shellyops_config::to_sync_config(&config, &overrides)?;
    debug!(repo = %sync_config.repo.display(), "opening repository");
    let manager = SyncManager::open(sync_config).await?;

    let cancel = manager.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("interrupted, cancelling in-flight devices");
            cancel.cancel();
        }
    });

    commands::dispatch(cli.command, &manager, render).await
}

/// Logs go to stderr so they never mix with rendered output.
fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
