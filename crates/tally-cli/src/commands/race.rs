use std::path::Path;

use tally_core::RaceId;

use crate::commands::common::{format_race_lines, open_database, parse_time, print_lines};
use crate::error::CliError;

pub async fn run_race_add(
    id: RaceId,
    name: &str,
    start: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let start_time = parse_time(start)?;
    let db = open_database(db_path).await?;
    let race = db.create_race(id, name, start_time).await?;
    println!("Created race {} ({})", race.id, race.name);
    Ok(())
}

pub async fn run_race_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let races = db.list_races().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&races)?);
    } else {
        print_lines(&format_race_lines(&races), "No races yet. Add one with `tally race add`.");
    }
    Ok(())
}
