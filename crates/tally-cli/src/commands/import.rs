use std::io::{self, BufRead, IsTerminal, Write};
use std::path::Path;

use serde::Serialize;
use tally_core::reconcile::ImportReport;
use tally_core::resolution::{Choice, ResolutionSession};
use tally_core::services::BaseStationService;
use tally_core::RaceId;

use crate::commands::common::{format_conflict_lines, open_database};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    #[serde(flatten)]
    pub report: ImportReport,
    /// Conflicts settled and written during this run
    pub resolved: usize,
    /// Conflicts left for a later re-import
    pub pending: usize,
}

pub async fn run_import(
    file: &Path,
    race: &RaceId,
    prefer: Option<Choice>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let bytes = std::fs::read(file)?;
    let base = BaseStationService::new(open_database(db_path).await?);
    let report = base.reconcile_bytes(&bytes, race).await?;

    let mut session = BaseStationService::begin_resolution(report.conflicts.clone());
    let decided = match prefer {
        Some(choice) => {
            session.decide_all(choice);
            true
        }
        None if !as_json && report.has_conflicts() && io::stdin().is_terminal() => {
            let stdin = io::stdin();
            resolve_interactively(&mut session, &mut stdin.lock(), &mut io::stdout())?;
            true
        }
        None => report.conflicts.is_empty(),
    };

    let resolved = if decided {
        match session.submit() {
            Ok(write_set) => {
                base.apply_resolution(&write_set).await?;
                write_set.len()
            }
            Err(session) => return Err(CliError::ResolutionAborted(session.undecided().count())),
        }
    } else {
        0
    };

    let summary = ImportSummary {
        pending: report.conflicts.len() - resolved,
        resolved,
        report,
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        for line in format_import_summary(&summary) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_import_summary(summary: &ImportSummary) -> Vec<String> {
    let report = &summary.report;
    let source = report.checkpoint_number().map_or_else(
        || "race results".to_string(),
        |number| format!("checkpoint {number}"),
    );

    let mut lines = vec![format!(
        "Imported {source} of race {}: {} runners, {} new, {} redundant, {} conflicts",
        report.race_id,
        report.total_runners,
        report.new_records,
        report.redundant,
        report.conflicts.len()
    )];

    if summary.resolved > 0 {
        lines.push(format!("Resolved {} conflicts", summary.resolved));
    }
    if summary.pending > 0 {
        for conflict in &report.conflicts {
            lines.extend(format_conflict_lines(conflict));
        }
        lines.push(format!(
            "{} conflicts left pending; re-import with --prefer existing|incoming to settle them",
            summary.pending
        ));
    }
    lines
}

/// Ask for one decision per conflict until the batch is complete
pub fn resolve_interactively<R: BufRead, W: Write>(
    session: &mut ResolutionSession,
    input: &mut R,
    output: &mut W,
) -> Result<(), CliError> {
    let conflicts = session.conflicts().to_vec();
    let total = conflicts.len();

    for (index, conflict) in conflicts.iter().enumerate() {
        writeln!(output, "[{}/{total}]", index + 1)?;
        for line in format_conflict_lines(conflict) {
            writeln!(output, "{line}")?;
        }

        let choice = loop {
            write!(output, "Keep [e]xisting or take [i]ncoming? ")?;
            output.flush()?;

            let mut answer = String::new();
            if input.read_line(&mut answer)? == 0 {
                return Err(CliError::ResolutionAborted(session.undecided().count()));
            }
            if let Some(choice) = parse_answer(&answer) {
                break choice;
            }
        };
        session.decide(&conflict.id, choice)?;
    }

    Ok(())
}

fn parse_answer(answer: &str) -> Option<Choice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "e" => Some(Choice::Existing),
        "i" => Some(Choice::Incoming),
        other => other.parse().ok(),
    }
}
