mod cli;
mod commands;
mod completions;
mod error;
mod output;
mod setup;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use cloudbox_core::paths;
use setup::CliContext;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) -> Result<WorkerGuard> {
    let file_appender = tracing_appender::rolling::daily(paths::logs_dir()?, "cloudbox.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Ok(guard)
}

async fn run(cli: Cli) -> Result<i32> {
    let ctx = CliContext::load(&cli)?;
    commands::run(&ctx, cli.command).await
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        completions::generate_completions(shell);
        return;
    }

    // Logging always goes to a file so it never mixes with command output
    let guard = match init_logging(cli.verbose) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: file logging disabled: {e:#}");
            None
        }
    };

    let outcome = run(cli).await;
    drop(guard);

    match outcome {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(err) => error::handle_error(err),
    }
}
