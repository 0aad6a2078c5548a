use std::path::Path;

use tally_core::services::CheckpointService;
use tally_core::RaceId;

use crate::commands::common::{format_audit_lines, open_database, print_lines};
use crate::error::CliError;

pub async fn run_audit(
    race: &RaceId,
    limit: usize,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let service = CheckpointService::new(open_database(db_path).await?);
    let entries = service.audit_trail(race, limit).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_lines(&format_audit_lines(&entries), "No archived values.");
    }
    Ok(())
}
