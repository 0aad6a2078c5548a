use std::io::Cursor;
use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use clap::Parser;
use tally_core::matrix::build_matrix;
use tally_core::models::{
    ComparableField, Conflict, ConsolidatedRecord, ImportedCheckpointSnapshot, RunnerStatus,
    Settings,
};
use tally_core::resolution::{Choice, ResolutionSession};
use tally_core::services::{BaseStationService, DatabaseService};
use tally_core::{RaceId, SightingKey, SightingRecord};

use crate::cli::{CheckpointArgs, Cli, Commands, CompletionShell, PreferArg};
use crate::commands::common::{
    format_matrix_lines, format_sighting_lines, format_timestamp, parse_time, resolve_db_path,
};
use crate::commands::completions::render_completions;
use crate::commands::export::run_export;
use crate::commands::import::{format_import_summary, resolve_interactively, run_import, ImportSummary};
use crate::commands::race::run_race_add;
use crate::commands::record::run_record;
use crate::commands::settings::apply_settings_update;
use crate::error::CliError;

fn race() -> RaceId {
    RaceId::new("r1").unwrap()
}

fn conflict(runner: u32) -> Conflict {
    let at = Utc.with_ymd_and_hms(2026, 6, 6, 10, 5, 0).unwrap();
    let existing = SightingRecord::new(race(), 2, runner).with_status(RunnerStatus::Passed, Some(at));
    let mut incoming = existing.clone();
    incoming.status = RunnerStatus::Withdrawn;
    Conflict::new(
        ConsolidatedRecord::new(existing, at),
        ConsolidatedRecord::new(incoming, at),
        vec![ComparableField::Status],
    )
}

fn checkpoint(checkpoint: u32) -> CheckpointArgs {
    CheckpointArgs {
        race: race(),
        checkpoint,
    }
}

#[test]
fn parse_time_accepts_rfc3339_and_plain_formats() {
    let expected = Utc.with_ymd_and_hms(2026, 6, 6, 10, 5, 0).unwrap();
    assert_eq!(parse_time("2026-06-06T10:05:00Z").unwrap(), expected);
    assert_eq!(parse_time("2026-06-06T12:05:00+02:00").unwrap(), expected);
    assert_eq!(parse_time(" 2026-06-06 10:05 ").unwrap(), expected);
    assert_eq!(parse_time("2026-06-06 10:05:00").unwrap(), expected);
    assert!(matches!(parse_time("10:05"), Err(CliError::InvalidTime(_))));
}

#[test]
fn format_timestamp_uses_dash_for_missing() {
    assert_eq!(format_timestamp(None), "-");
    assert_eq!(
        format_timestamp(Some(Utc.with_ymd_and_hms(2026, 6, 6, 10, 5, 0).unwrap())),
        "2026-06-06 10:05:00"
    );
}

#[test]
fn format_sighting_lines_show_notes_only_when_present() {
    let mut record = SightingRecord::new(race(), 2, 7);
    let plain = format_sighting_lines(std::slice::from_ref(&record));
    assert!(plain[0].contains("not-started"));
    assert!(plain[0].ends_with("pending"));

    record.notes = Some("blister".to_string());
    let noted = format_sighting_lines(&[record]);
    assert!(noted[0].ends_with("blister"));
}

#[test]
fn format_matrix_lines_render_absent_as_dash() {
    let snapshots = [
        ImportedCheckpointSnapshot::new(
            race(),
            1,
            vec![SightingRecord::new(race(), 1, 101).with_status(RunnerStatus::Passed, None)],
        ),
        ImportedCheckpointSnapshot::new(race(), 2, vec![SightingRecord::new(race(), 2, 102)]),
    ];
    let lines = format_matrix_lines(&build_matrix(&snapshots));

    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("cp1") && lines[0].contains("cp2"));
    assert!(lines[1].starts_with("   101  passed"));
    assert!(lines[1].ends_with('-'));
    assert!(lines[2].starts_with("   102  -"));
    assert!(lines[2].ends_with("not-started"));
}

#[test]
fn interactive_resolution_reprompts_until_valid_answer() {
    let mut session = ResolutionSession::new(vec![conflict(101), conflict(102)]);
    let mut input = Cursor::new("maybe\ni\nexisting\n");
    let mut output = Vec::new();

    resolve_interactively(&mut session, &mut input, &mut output).unwrap();

    assert!(session.is_ready());
    assert_eq!(session.decision("r1/2/101"), Some(Choice::Incoming));
    assert_eq!(session.decision("r1/2/102"), Some(Choice::Existing));
    let prompt = String::from_utf8(output).unwrap();
    assert!(prompt.contains("[1/2]"));
    assert!(prompt.contains("existing=passed  incoming=withdrawn"));
}

#[test]
fn interactive_resolution_aborts_on_end_of_input() {
    let mut session = ResolutionSession::new(vec![conflict(101), conflict(102)]);
    let mut input = Cursor::new("e\n");

    let error = resolve_interactively(&mut session, &mut input, &mut Vec::new()).unwrap_err();
    assert!(matches!(error, CliError::ResolutionAborted(1)));
    assert!(!session.is_ready());
}

#[test]
fn import_summary_lists_pending_conflicts() {
    let summary = ImportSummary {
        report: tally_core::reconcile::ImportReport {
            race_id: race(),
            source: tally_core::reconcile::ImportSource::Checkpoint(2),
            total_runners: 2,
            new_records: 0,
            redundant: 1,
            conflicts: vec![conflict(101)],
        },
        resolved: 0,
        pending: 1,
    };

    let lines = format_import_summary(&summary);
    assert!(lines[0].starts_with("Imported checkpoint 2 of race r1: 2 runners"));
    assert!(lines.iter().any(|line| line.starts_with("Conflict r1/2/101")));
    assert!(lines.last().unwrap().contains("1 conflicts left pending"));
}

#[test]
fn settings_update_validates() {
    let updated = apply_settings_update(Settings::default(), Some(10), Some("status, notes")).unwrap();
    assert_eq!(updated.bucket_width_minutes, 10);
    assert_eq!(
        updated.comparable_fields,
        vec![ComparableField::Status, ComparableField::Notes]
    );

    assert!(apply_settings_update(Settings::default(), Some(0), None).is_err());
    assert!(apply_settings_update(Settings::default(), None, Some(" , ")).is_err());
    assert!(apply_settings_update(Settings::default(), None, Some("colour")).is_err());
}

#[test]
fn cli_parses_import_and_record_arguments() {
    let cli = Cli::try_parse_from([
        "tally", "import", "cp2.json", "--race", "r1", "--prefer", "incoming", "--json",
    ])
    .unwrap();
    match cli.command {
        Commands::Import {
            file,
            race: race_id,
            prefer,
            json,
        } => {
            assert_eq!(file, PathBuf::from("cp2.json"));
            assert_eq!(race_id, race());
            assert_eq!(prefer, Some(PreferArg::Incoming));
            assert!(json);
        }
        _ => panic!("expected import command"),
    }

    let cli = Cli::try_parse_from([
        "tally", "--db-path", "t.db", "record", "-r", "r1", "-c", "2", "101", "--status", "dnf",
    ])
    .unwrap();
    assert_eq!(cli.db_path, Some(PathBuf::from("t.db")));
    assert!(matches!(
        cli.command,
        Commands::Record {
            runner: 101,
            status: RunnerStatus::Dnf,
            ..
        }
    ));

    assert!(Cli::try_parse_from(["tally", "matrix", "--race", "bad id"]).is_err());
}

#[test]
fn explicit_db_path_wins() {
    let path = resolve_db_path(Some(PathBuf::from("/tmp/explicit.db"))).unwrap();
    assert_eq!(path, PathBuf::from("/tmp/explicit.db"));
}

#[test]
fn completions_name_the_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("tally"));
}

#[tokio::test(flavor = "multi_thread")]
async fn export_then_import_with_preference_applies_correction() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let package_path = dir.path().join("cp2.json");

    run_race_add(race(), "Spring 100", "2026-06-06 09:00", &db_path)
        .await
        .unwrap();
    run_record(
        checkpoint(2),
        101,
        RunnerStatus::Passed,
        Some("2026-06-06 10:05"),
        None,
        &db_path,
    )
    .await
    .unwrap();

    run_export(&race(), Some(2), Some(&package_path), &db_path)
        .await
        .unwrap();
    run_import(&package_path, &race(), None, true, &db_path)
        .await
        .unwrap();

    run_record(checkpoint(2), 101, RunnerStatus::Withdrawn, None, None, &db_path)
        .await
        .unwrap();
    run_export(&race(), Some(2), Some(&package_path), &db_path)
        .await
        .unwrap();
    run_import(&package_path, &race(), Some(Choice::Incoming), true, &db_path)
        .await
        .unwrap();

    let base = BaseStationService::new(DatabaseService::open_path(&db_path).await.unwrap());
    let records = base.consolidated(&race()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].key(), SightingKey::new(race(), 2, 101));
    assert_eq!(records[0].record.status, RunnerStatus::Withdrawn);
}

#[tokio::test(flavor = "multi_thread")]
async fn import_into_wrong_race_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tally.db");
    let package_path = dir.path().join("cp1.json");

    run_race_add(race(), "One", "2026-06-06 09:00", &db_path).await.unwrap();
    run_race_add(RaceId::new("r2").unwrap(), "Two", "2026-06-07 09:00", &db_path)
        .await
        .unwrap();
    run_record(checkpoint(1), 5, RunnerStatus::Passed, None, None, &db_path)
        .await
        .unwrap();
    run_export(&race(), Some(1), Some(&package_path), &db_path)
        .await
        .unwrap();

    let error = run_import(&package_path, &RaceId::new("r2").unwrap(), None, true, &db_path)
        .await
        .unwrap_err();
    assert!(error.to_string().contains("belongs to race 'r1'"));
}
