use std::path::Path;

use tally_core::export::suggested_export_file_name;
use tally_core::services::{BaseStationService, CheckpointService};
use tally_core::RaceId;

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_export(
    race: &RaceId,
    checkpoint: Option<u32>,
    output_path: Option<&Path>,
    db_path: &Path,
) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let package = match checkpoint {
        Some(number) => CheckpointService::new(db).export_checkpoint(race, number).await?,
        None => BaseStationService::new(db).export_race(race).await?,
    };
    let rendered = package.to_json()?;

    if let Some(path) = output_path {
        // A directory gets a generated file name
        let path = if path.is_dir() {
            path.join(suggested_export_file_name(&package))
        } else {
            path.to_path_buf()
        };
        std::fs::write(&path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}
