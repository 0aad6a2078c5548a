use std::path::Path;

use tally_core::services::BaseStationService;
use tally_core::RaceId;

use crate::cli::CheckpointArgs;
use crate::commands::common::{
    format_matrix_lines, format_sighting_lines, matrix_to_item, open_database, print_lines,
};
use crate::error::CliError;

pub async fn run_matrix(race: &RaceId, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let base = BaseStationService::new(open_database(db_path).await?);
    let matrix = base.matrix(race).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&matrix_to_item(&matrix))?);
    } else {
        print_lines(
            &format_matrix_lines(&matrix),
            "No checkpoints imported yet. Import a package with `tally import`.",
        );
    }
    Ok(())
}

pub async fn run_drilldown(
    at: CheckpointArgs,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let base = BaseStationService::new(open_database(db_path).await?);
    let records = base
        .drilldown(&at.race, at.checkpoint)
        .await?
        .ok_or(CliError::CheckpointNotImported(at.checkpoint))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
    } else {
        print_lines(&format_sighting_lines(&records), "Checkpoint reported no runners.");
    }
    Ok(())
}
