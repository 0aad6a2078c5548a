use std::path::Path;

use tally_core::models::RunnerStatus;
use tally_core::services::CheckpointService;
use tally_core::SightingKey;

use crate::cli::CheckpointArgs;
use crate::commands::common::{format_sighting_lines, open_database, parse_time, print_lines};
use crate::error::CliError;

pub async fn run_record(
    at: CheckpointArgs,
    runner: u32,
    status: RunnerStatus,
    time: Option<&str>,
    notes: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let mark_off_time = time.map(parse_time).transpose()?;
    let service = CheckpointService::new(open_database(db_path).await?);
    let record = service
        .record_sighting(
            SightingKey::new(at.race, at.checkpoint, runner),
            status,
            mark_off_time,
            notes,
        )
        .await?;

    for line in format_sighting_lines(std::slice::from_ref(&record)) {
        println!("{line}");
    }
    Ok(())
}

pub async fn run_remove(at: CheckpointArgs, runner: u32, db_path: &Path) -> Result<(), CliError> {
    let service = CheckpointService::new(open_database(db_path).await?);
    let removed = service
        .remove_sighting(&SightingKey::new(at.race, at.checkpoint, runner))
        .await?;
    println!("Removed {}", removed.key());
    Ok(())
}

pub async fn run_list(at: CheckpointArgs, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let service = CheckpointService::new(open_database(db_path).await?);
    let records = service.list_sightings(&at.race, at.checkpoint).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_lines(&format_sighting_lines(&records), "No sightings recorded.");
    }
    Ok(())
}
