pub mod auth;
pub mod billing;
pub mod config;
pub mod env;
pub mod exec;
pub mod files;
pub mod profile;
pub mod sandbox;
pub mod template;
pub mod utils;

use anyhow::Result;

use crate::cli::Commands;
use crate::setup::CliContext;

/// Dispatch a command. The return value is the process exit code.
pub async fn run(ctx: &CliContext, command: Commands) -> Result<i32> {
    let format = ctx.format();

    match command {
        Commands::Login(args) => auth::login(ctx, args, format).await?,
        Commands::Logout => auth::logout(ctx, format)?,
        Commands::Whoami => auth::whoami(ctx, format).await?,
        Commands::Auth { command } => auth::run(ctx, command, format).await?,
        Commands::Config { command } => config::run(ctx, command, format)?,
        Commands::Profile { command } => profile::run(ctx, command, format)?,
        Commands::Sandbox { command } => sandbox::run(ctx, command, format).await?,
        Commands::Files { command } => files::run(ctx, command, format).await?,
        Commands::Exec(args) => return exec::run(ctx, args, format).await,
        Commands::Process { command } => exec::run_process(ctx, command, format).await?,
        Commands::Env { command } => env::run(ctx, command, format).await?,
        Commands::Billing { command } => billing::run(ctx, command, format).await?,
        Commands::Template { command } => template::run(ctx, command, format).await?,
        Commands::Completions { shell } => crate::completions::generate_completions(shell),
    }

    Ok(0)
}
