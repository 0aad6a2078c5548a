//! Import reconciliation pipeline.
//!
//! Every incoming sighting is compared with the base station's consolidated
//! record for the same key and classified as new, redundant or conflicting.
//! New records are committed straight away because they cannot lose
//! information. Conflicts are never settled automatically, not even when one
//! side is newer: a checkpoint's clock does not outrank a human correction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{ConsolidatedRepository, SnapshotRepository, SqliteAuditLog};
use crate::error::{DecodeError, Error, ImportError, Result};
use crate::export::{decode, ExportPackage, ExportPayload};
use crate::models::{
    AuditAction, AuditEntry, ComparableField, Conflict, ConsolidatedRecord,
    ImportedCheckpointSnapshot, RaceId, Settings, SightingKey, SightingRecord,
};
use crate::resolution::WriteSet;
use crate::util::truncate_to_ms;

/// Outcome of comparing one incoming record with the stored one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Nothing stored yet for this key
    New,
    /// Stored record agrees on every comparable field
    Redundant,
    /// Stored record differs on the listed fields
    Conflicting(Vec<ComparableField>),
}

/// Compare `incoming` with the stored record using the configured fields
#[must_use]
pub fn classify(
    existing: Option<&SightingRecord>,
    incoming: &SightingRecord,
    settings: &Settings,
) -> Classification {
    let Some(existing) = existing else {
        return Classification::New;
    };

    let differing = settings.differing_fields(existing, incoming);
    if differing.is_empty() {
        Classification::Redundant
    } else {
        Classification::Conflicting(differing)
    }
}

/// Where an imported package came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "checkpoint")]
pub enum ImportSource {
    /// A single checkpoint's `checkpoint-results` export
    Checkpoint(u32),
    /// Another base station's `race-results` export
    Race,
}

/// Classified contents of a package, before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub race_id: RaceId,
    pub source: ImportSource,
    pub total_runners: usize,
    pub new_records: Vec<ConsolidatedRecord>,
    pub redundant: Vec<SightingKey>,
    pub conflicts: Vec<Conflict>,
    pub snapshots: Vec<ImportedCheckpointSnapshot>,
}

/// Summary handed back to the presentation layer after a successful import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub race_id: RaceId,
    pub source: ImportSource,
    pub total_runners: usize,
    pub new_records: usize,
    pub redundant: usize,
    /// Pending human decisions; hand these to a `ResolutionSession`
    pub conflicts: Vec<Conflict>,
}

impl ImportReport {
    /// Checkpoint the package came from, for checkpoint exports
    #[must_use]
    pub const fn checkpoint_number(&self) -> Option<u32> {
        match self.source {
            ImportSource::Checkpoint(number) => Some(number),
            ImportSource::Race => None,
        }
    }

    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Decode raw bytes for import, reporting failures as an unreadable package
pub fn decode_for_import(bytes: &[u8]) -> Result<ExportPackage> {
    decode(bytes).map_err(|error: DecodeError| {
        tracing::warn!("Rejected unreadable package: {error}");
        Error::Import(ImportError::UnreadablePackage(error))
    })
}

/// Fail with `RaceMismatch` unless `package` belongs to `target_race`
pub fn ensure_same_race(package: &ExportPackage, target_race: &RaceId) -> Result<()> {
    let package_race = package.race_id();
    if package_race == target_race {
        return Ok(());
    }

    tracing::warn!(
        "Rejected package for race '{}' while importing into '{}'",
        package_race,
        target_race
    );
    Err(ImportError::RaceMismatch {
        expected: target_race.to_string(),
        found: package_race.to_string(),
    }
    .into())
}

/// Classify every record of `package` against `store`.
///
/// Reads only; rejects packages for another race before looking at records.
pub fn plan<C: ConsolidatedRepository>(
    package: &ExportPackage,
    target_race: &RaceId,
    store: &C,
    settings: &Settings,
    received_at: DateTime<Utc>,
) -> Result<ReconcilePlan> {
    ensure_same_race(package, target_race)?;

    let source = match &package.payload {
        ExportPayload::CheckpointResults(results) => {
            ImportSource::Checkpoint(results.checkpoint_number)
        }
        ExportPayload::RaceResults(_) => ImportSource::Race,
    };
    let incoming_at = truncate_to_ms(package.exported_at.unwrap_or(received_at));

    let mut plan = ReconcilePlan {
        race_id: target_race.clone(),
        source,
        total_runners: 0,
        new_records: Vec::new(),
        redundant: Vec::new(),
        conflicts: Vec::new(),
        snapshots: Vec::new(),
    };

    for (checkpoint_number, sightings) in package.payload.sightings_by_checkpoint() {
        plan.total_runners += sightings.len();

        for sighting in &sightings {
            let key = sighting.key();
            let existing = store.get(&key)?;
            let incoming = ConsolidatedRecord::new(sighting.clone(), incoming_at);

            let classification =
                classify(existing.as_ref().map(|e| &e.record), sighting, settings);
            match classification {
                Classification::New => {
                    tracing::debug!("{key}: new");
                    plan.new_records.push(incoming);
                }
                Classification::Redundant => {
                    tracing::debug!("{key}: redundant");
                    plan.redundant.push(key);
                }
                Classification::Conflicting(fields) => {
                    tracing::debug!("{key}: conflicting on {fields:?}");
                    if let Some(existing) = existing {
                        plan.conflicts.push(Conflict::new(existing, incoming, fields));
                    }
                }
            }
        }

        plan.snapshots.push(ImportedCheckpointSnapshot {
            race_id: target_race.clone(),
            checkpoint_number,
            imported_at: truncate_to_ms(received_at),
            runners: sightings,
        });
    }

    Ok(plan)
}

/// Write the new records and replace the snapshots of a plan.
///
/// Conflicting records are left untouched and returned in the report.
pub fn commit<C: ConsolidatedRepository, S: SnapshotRepository>(
    plan: ReconcilePlan,
    consolidated: &C,
    snapshots: &S,
) -> Result<ImportReport> {
    for record in &plan.new_records {
        consolidated.put(record)?;
    }
    for snapshot in &plan.snapshots {
        snapshots.put(snapshot)?;
    }

    tracing::info!(
        "Imported {} runners for race '{}' ({} new, {} redundant, {} conflicts)",
        plan.total_runners,
        plan.race_id,
        plan.new_records.len(),
        plan.redundant.len(),
        plan.conflicts.len()
    );

    Ok(ImportReport {
        race_id: plan.race_id,
        source: plan.source,
        total_runners: plan.total_runners,
        new_records: plan.new_records.len(),
        redundant: plan.redundant.len(),
        conflicts: plan.conflicts,
    })
}

/// Apply a resolved write-set through the same path as new records.
///
/// Every write is checked against the store before anything is written; a
/// record that moved on since detection fails the whole batch. Values that
/// get replaced are archived. Returns the number of records that changed.
pub fn apply_write_set<C: ConsolidatedRepository>(
    write_set: &WriteSet,
    consolidated: &C,
    audit: &SqliteAuditLog<'_>,
) -> Result<usize> {
    let mut current_values = Vec::with_capacity(write_set.writes.len());
    for write in &write_set.writes {
        let current = consolidated.get(&write.record.key())?;
        if current.as_ref() != Some(&write.replaced) {
            return Err(Error::StaleConflict(write.conflict_id.clone()));
        }
        current_values.push(current);
    }

    let mut changed = 0;
    for (write, current) in write_set.writes.iter().zip(current_values) {
        if current.as_ref() == Some(&write.record) {
            continue;
        }
        if let Some(current) = current {
            audit.append(&AuditEntry::new(AuditAction::Resolved, current.record))?;
        }
        consolidated.put(&write.record)?;
        changed += 1;
    }

    tracing::info!(
        "Applied {} resolved conflicts ({} changed)",
        write_set.writes.len(),
        changed
    );
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, SqliteConsolidatedRepository, SqliteSnapshotRepository};
    use crate::export::encode_checkpoint;
    use crate::models::RunnerStatus;
    use crate::resolution::{Choice, ResolutionSession};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn race() -> RaceId {
        RaceId::new("r1").unwrap()
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 6, 10, minute, 0).unwrap()
    }

    fn checkpoint_two(runner_101: RunnerStatus) -> ExportPackage {
        let mut package = encode_checkpoint(
            &race(),
            2,
            &[
                SightingRecord::new(race(), 2, 101).with_status(runner_101, Some(at(5))),
                SightingRecord::new(race(), 2, 102),
            ],
        );
        package.exported_at = Some(at(30));
        package
    }

    fn import(db: &Database, package: &ExportPackage) -> Result<ImportReport> {
        let consolidated = SqliteConsolidatedRepository::new(db.connection());
        let snapshots = SqliteSnapshotRepository::new(db.connection());
        let plan = plan(package, &race(), &consolidated, &Settings::default(), at(45))?;
        commit(plan, &consolidated, &snapshots)
    }

    #[test]
    fn classify_covers_all_outcomes() {
        let settings = Settings::default();
        let stored = SightingRecord::new(race(), 2, 101);
        let mut changed = stored.clone();
        changed.notes = Some("late".to_string());

        assert_eq!(classify(None, &stored, &settings), Classification::New);
        assert_eq!(
            classify(Some(&stored), &stored, &settings),
            Classification::Redundant
        );
        assert_eq!(
            classify(Some(&stored), &changed, &settings),
            Classification::Conflicting(vec![ComparableField::Notes])
        );
    }

    #[test]
    fn first_import_commits_everything_as_new() {
        let db = Database::open_in_memory().unwrap();
        let report = import(&db, &checkpoint_two(RunnerStatus::Passed)).unwrap();

        assert_eq!(report.checkpoint_number(), Some(2));
        assert_eq!(report.total_runners, 2);
        assert_eq!(report.new_records, 2);
        assert!(report.conflicts.is_empty());

        let stored = SqliteConsolidatedRepository::new(db.connection())
            .query_by_race(&race())
            .unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].last_updated, at(30));
    }

    #[test]
    fn reimporting_same_package_is_a_no_op() {
        let db = Database::open_in_memory().unwrap();
        let package = checkpoint_two(RunnerStatus::Passed);
        import(&db, &package).unwrap();

        let second = import(&db, &package).unwrap();
        assert_eq!(second.new_records, 0);
        assert_eq!(second.redundant, 2);
        assert!(second.conflicts.is_empty());
    }

    #[test]
    fn corrected_record_becomes_conflict_not_overwrite() {
        let db = Database::open_in_memory().unwrap();
        import(&db, &checkpoint_two(RunnerStatus::Passed)).unwrap();

        let report = import(&db, &checkpoint_two(RunnerStatus::Withdrawn)).unwrap();
        assert_eq!(report.redundant, 1);
        assert_eq!(report.conflicts.len(), 1);

        let conflict = &report.conflicts[0];
        assert_eq!(conflict.id, "r1/2/101");
        assert_eq!(conflict.existing.record.status, RunnerStatus::Passed);
        assert_eq!(conflict.incoming.record.status, RunnerStatus::Withdrawn);
        assert_eq!(conflict.differing_fields, vec![ComparableField::Status]);

        // Stored value untouched until a human decides
        let stored = SqliteConsolidatedRepository::new(db.connection())
            .get(&conflict.key())
            .unwrap()
            .unwrap();
        assert_eq!(stored.record.status, RunnerStatus::Passed);
    }

    #[test]
    fn changed_mark_off_time_alone_becomes_conflict() {
        let db = Database::open_in_memory().unwrap();
        import(&db, &checkpoint_two(RunnerStatus::Passed)).unwrap();

        let mut corrected = checkpoint_two(RunnerStatus::Passed);
        if let ExportPayload::CheckpointResults(results) = &mut corrected.payload {
            results.runners[0].mark_off_time = Some(at(7));
        }
        let report = import(&db, &corrected).unwrap();

        assert_eq!(report.redundant, 1);
        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(
            report.conflicts[0].differing_fields,
            vec![ComparableField::MarkOffTime]
        );
        let stored = SqliteConsolidatedRepository::new(db.connection())
            .get(&report.conflicts[0].key())
            .unwrap()
            .unwrap();
        assert_eq!(stored.record.mark_off_time, Some(at(5)));
    }

    #[test]
    fn changed_call_in_time_alone_becomes_conflict() {
        let db = Database::open_in_memory().unwrap();
        import(&db, &checkpoint_two(RunnerStatus::Passed)).unwrap();

        let mut called = checkpoint_two(RunnerStatus::Passed);
        if let ExportPayload::CheckpointResults(results) = &mut called.payload {
            results.runners[0].call_in_time = Some(at(9));
        }
        let report = import(&db, &called).unwrap();

        assert_eq!(report.conflicts.len(), 1);
        assert_eq!(report.conflicts[0].id, "r1/2/101");
        assert_eq!(
            report.conflicts[0].differing_fields,
            vec![ComparableField::CallInTime]
        );
        let stored = SqliteConsolidatedRepository::new(db.connection())
            .get(&report.conflicts[0].key())
            .unwrap()
            .unwrap();
        assert_eq!(stored.record.call_in_time, None);
    }

    #[test]
    fn snapshot_replaced_even_when_conflicts_pending() {
        let db = Database::open_in_memory().unwrap();
        import(&db, &checkpoint_two(RunnerStatus::Passed)).unwrap();
        import(&db, &checkpoint_two(RunnerStatus::Withdrawn)).unwrap();

        let snapshot = SqliteSnapshotRepository::new(db.connection())
            .get(&race(), 2)
            .unwrap()
            .unwrap();
        assert_eq!(snapshot.runner(101).unwrap().status, RunnerStatus::Withdrawn);
    }

    #[test]
    fn race_mismatch_writes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let consolidated = SqliteConsolidatedRepository::new(db.connection());
        let package = checkpoint_two(RunnerStatus::Passed);

        let error = plan(
            &package,
            &RaceId::new("other").unwrap(),
            &consolidated,
            &Settings::default(),
            at(45),
        )
        .unwrap_err();
        assert!(matches!(
            error,
            Error::Import(ImportError::RaceMismatch { ref expected, ref found })
                if expected == "other" && found == "r1"
        ));
        assert!(consolidated.query_by_race(&race()).unwrap().is_empty());
    }

    #[test]
    fn decode_for_import_wraps_decode_errors() {
        let error = decode_for_import(b"{").unwrap_err();
        assert!(matches!(
            error,
            Error::Import(ImportError::UnreadablePackage(DecodeError::MalformedPayload(_)))
        ));
    }

    #[test]
    fn missing_export_time_uses_receive_time() {
        let db = Database::open_in_memory().unwrap();
        let mut package = checkpoint_two(RunnerStatus::Passed);
        package.exported_at = None;
        import(&db, &package).unwrap();

        let stored = SqliteConsolidatedRepository::new(db.connection())
            .query_by_race(&race())
            .unwrap();
        assert_eq!(stored[0].last_updated, at(45));
    }

    #[test]
    fn resolved_write_set_applies_incoming_and_archives_existing() {
        let db = Database::open_in_memory().unwrap();
        import(&db, &checkpoint_two(RunnerStatus::Passed)).unwrap();
        let report = import(&db, &checkpoint_two(RunnerStatus::Withdrawn)).unwrap();

        let mut session = ResolutionSession::new(report.conflicts);
        session.decide("r1/2/101", Choice::Incoming).unwrap();
        let write_set = session.submit().unwrap();

        let consolidated = SqliteConsolidatedRepository::new(db.connection());
        let audit = SqliteAuditLog::new(db.connection());
        assert_eq!(apply_write_set(&write_set, &consolidated, &audit).unwrap(), 1);

        let stored = consolidated
            .get(&SightingKey::new(race(), 2, 101))
            .unwrap()
            .unwrap();
        assert_eq!(stored.record.status, RunnerStatus::Withdrawn);

        let trail = audit.list(&race(), 10).unwrap();
        assert_eq!(trail[0].action, AuditAction::Resolved);
        assert_eq!(trail[0].previous.status, RunnerStatus::Passed);

        // Applying the same write-set again finds the store moved on
        assert!(matches!(
            apply_write_set(&write_set, &consolidated, &audit),
            Err(Error::StaleConflict(_))
        ));
    }

    #[test]
    fn keeping_existing_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        import(&db, &checkpoint_two(RunnerStatus::Passed)).unwrap();
        let report = import(&db, &checkpoint_two(RunnerStatus::Dnf)).unwrap();

        let mut session = ResolutionSession::new(report.conflicts);
        session.decide("r1/2/101", Choice::Existing).unwrap();
        let write_set = session.submit().unwrap();

        let consolidated = SqliteConsolidatedRepository::new(db.connection());
        let audit = SqliteAuditLog::new(db.connection());
        assert_eq!(apply_write_set(&write_set, &consolidated, &audit).unwrap(), 0);
        assert!(audit.list(&race(), 10).unwrap().is_empty());
    }
}
