//! Tally CLI - checkpoint record keeping and base station reconciliation
//!
//! One binary serves both ends of the store-and-forward loop: checkpoints
//! record and export sightings, the base station imports and reconciles them.

mod cli;
mod commands;
mod error;

#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, RaceCommands, SettingsCommands};
use crate::commands::audit::run_audit;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::export::run_export;
use crate::commands::import::run_import;
use crate::commands::matrix::{run_drilldown, run_matrix};
use crate::commands::race::{run_race_add, run_race_list};
use crate::commands::record::{run_list, run_record, run_remove};
use crate::commands::segments::{run_call_in, run_segments};
use crate::commands::settings::{run_settings_set, run_settings_show};
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

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tally=info".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();

    // Completions never touch the store
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Commands::Race { command } => match command {
            RaceCommands::Add { id, name, start } => {
                run_race_add(id, &name, &start, &db_path).await?;
            }
            RaceCommands::List { json } => run_race_list(json, &db_path).await?,
        },
        Commands::Record {
            at,
            runner,
            status,
            time,
            notes,
        } => run_record(at, runner, status, time.as_deref(), notes, &db_path).await?,
        Commands::Remove { at, runner } => run_remove(at, runner, &db_path).await?,
        Commands::List { at, json } => run_list(at, json, &db_path).await?,
        Commands::Segments { at, json } => run_segments(at, json, &db_path).await?,
        Commands::CallIn { at, label } => run_call_in(at, &label, &db_path).await?,
        Commands::Export {
            race,
            checkpoint,
            output,
        } => run_export(&race, checkpoint, output.as_deref(), &db_path).await?,
        Commands::Import {
            file,
            race,
            prefer,
            json,
        } => run_import(&file, &race, prefer.map(Into::into), json, &db_path).await?,
        Commands::Matrix { race, json } => run_matrix(&race, json, &db_path).await?,
        Commands::Drilldown { at, json } => run_drilldown(at, json, &db_path).await?,
        Commands::Audit { race, limit, json } => run_audit(&race, limit, json, &db_path).await?,
        Commands::Settings { command } => match command {
            SettingsCommands::Show { json } => run_settings_show(json, &db_path).await?,
            SettingsCommands::Set {
                bucket_width,
                comparable_fields,
            } => run_settings_set(bucket_width, comparable_fields.as_deref(), &db_path).await?,
        },
        Commands::Completions { .. } => {}
    }

    Ok(())
}
