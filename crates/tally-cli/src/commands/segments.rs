use std::path::Path;

use tally_core::services::CheckpointService;

use crate::cli::CheckpointArgs;
use crate::commands::common::{format_segment_lines, open_database, print_lines};
use crate::error::CliError;

pub async fn run_segments(
    at: CheckpointArgs,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = CheckpointService::new(open_database(db_path).await?);
    let segments = service.segments(&at.race, at.checkpoint).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&segments)?);
    } else {
        print_lines(&format_segment_lines(&segments), "No passed runners yet.");
    }
    Ok(())
}

pub async fn run_call_in(at: CheckpointArgs, label: &str, db_path: &Path) -> Result<(), CliError> {
    let service = CheckpointService::new(open_database(db_path).await?);
    let updated = service
        .mark_segment_called_in(&at.race, at.checkpoint, label)
        .await?;

    if updated == 0 {
        println!("Nothing to call in for segment {label}");
    } else {
        println!("Called in {updated} runners for segment {label}");
    }
    Ok(())
}
