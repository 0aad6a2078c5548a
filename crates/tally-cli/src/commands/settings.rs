use std::path::Path;

use tally_core::models::{format_comparable_fields, parse_comparable_fields, Settings};

use crate::commands::common::open_database;
use crate::error::CliError;

pub async fn run_settings_show(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let db = open_database(db_path).await?;
    let settings = db.load_settings().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&settings)?);
    } else {
        for line in format_settings_lines(&settings) {
            println!("{line}");
        }
    }
    Ok(())
}

pub async fn run_settings_set(
    bucket_width: Option<u32>,
    comparable_fields: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    if bucket_width.is_none() && comparable_fields.is_none() {
        return Err(CliError::NothingToUpdate);
    }

    let db = open_database(db_path).await?;
    let settings = apply_settings_update(db.load_settings().await?, bucket_width, comparable_fields)?;
    db.save_settings(&settings).await?;

    for line in format_settings_lines(&settings) {
        println!("{line}");
    }
    Ok(())
}

pub fn apply_settings_update(
    mut settings: Settings,
    bucket_width: Option<u32>,
    comparable_fields: Option<&str>,
) -> Result<Settings, CliError> {
    if let Some(minutes) = bucket_width {
        settings.bucket_width_minutes = minutes;
    }
    if let Some(fields) = comparable_fields {
        settings.comparable_fields = parse_comparable_fields(fields)?;
    }
    settings.validate()?;
    Ok(settings)
}

pub fn format_settings_lines(settings: &Settings) -> Vec<String> {
    vec![
        format!("bucket-width       {} min", settings.bucket_width_minutes),
        format!(
            "comparable-fields  {}",
            format_comparable_fields(&settings.comparable_fields)
        ),
    ]
}
