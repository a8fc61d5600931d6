//! storysync CLI - offline-first story capture from the terminal
//!
//! Stories are queued in a local libSQL file and pushed to the story service
//! on `storysync sync`.

mod cli;
mod commands;
mod error;
mod host;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::cache::run_cache;
use crate::commands::common::CliContext;
use crate::commands::completions::run_completions;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::purge::run_purge;
use crate::commands::push::run_push;
use crate::commands::submit::run_submit;
use crate::commands::sync::run_sync;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "storysync=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let ctx = CliContext::load(cli.config, cli.db_path)?;

    match cli.command {
        Commands::Add(args) => run_add(&args, &ctx).await?,
        Commands::Submit(args) => run_submit(&args, &ctx).await?,
        Commands::List { pending, json } => run_list(pending, json, &ctx).await?,
        Commands::Sync { json } => run_sync(json, &ctx).await?,
        Commands::Delete { id } => run_delete(&id, &ctx).await?,
        Commands::Purge => run_purge(&ctx).await?,
        Commands::Cache { command } => run_cache(&command, &ctx).await?,
        Commands::Push { payload, click } => run_push(payload.as_deref(), click, &ctx).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}
