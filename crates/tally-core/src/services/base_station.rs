//! Base station operations: import, resolution and aggregation.

use chrono::Utc;

use super::database::{require_race, DatabaseService};
use crate::db::{
    ConsolidatedRepository, SettingsRepository, SnapshotRepository, SqliteAuditLog,
    SqliteConsolidatedRepository, SqliteSettingsRepository, SqliteSnapshotRepository,
};
use crate::error::Result;
use crate::export::{encode_race, ExportPackage};
use crate::matrix::{build_matrix, drilldown, AggregationMatrix};
use crate::models::{
    Conflict, ConsolidatedRecord, ImportedCheckpointSnapshot, RaceId, SightingRecord,
};
use crate::reconcile::{
    apply_write_set, commit, decode_for_import, ensure_same_race, plan, ImportReport,
};
use crate::resolution::{ResolutionSession, WriteSet};

/// The base station's view of a store
#[derive(Clone)]
pub struct BaseStationService {
    db: DatabaseService,
}

impl BaseStationService {
    #[must_use]
    pub const fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Classify and commit a decoded package for `race_id`.
    ///
    /// New records and snapshots land in one transaction. Conflicts come
    /// back in the report untouched; nothing is written for a package that
    /// belongs to another race.
    pub async fn reconcile(&self, package: &ExportPackage, race_id: &RaceId) -> Result<ImportReport> {
        ensure_same_race(package, race_id)?;
        let db = self.db.lock().await;
        require_race(&db, race_id)?;
        let settings = SqliteSettingsRepository::new(db.connection()).load()?;

        let tx = db.connection().unchecked_transaction()?;
        let consolidated = SqliteConsolidatedRepository::new(&tx);
        let snapshots = SqliteSnapshotRepository::new(&tx);

        let plan = plan(package, race_id, &consolidated, &settings, Utc::now())?;
        let report = commit(plan, &consolidated, &snapshots)?;
        tx.commit()?;

        Ok(report)
    }

    /// Decode raw package bytes, then reconcile them
    pub async fn reconcile_bytes(&self, bytes: &[u8], race_id: &RaceId) -> Result<ImportReport> {
        let package = decode_for_import(bytes)?;
        self.reconcile(&package, race_id).await
    }

    /// Start a fresh decision batch for an import's conflicts
    #[must_use]
    pub fn begin_resolution(conflicts: Vec<Conflict>) -> ResolutionSession {
        ResolutionSession::new(conflicts)
    }

    /// Commit a fully decided batch. All writes land or none do.
    pub async fn apply_resolution(&self, write_set: &WriteSet) -> Result<usize> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let changed = apply_write_set(
            write_set,
            &SqliteConsolidatedRepository::new(&tx),
            &SqliteAuditLog::new(&tx),
        )?;
        tx.commit()?;
        Ok(changed)
    }

    /// Consolidated records of a race, by checkpoint then runner
    pub async fn consolidated(&self, race_id: &RaceId) -> Result<Vec<ConsolidatedRecord>> {
        let db = self.db.lock().await;
        SqliteConsolidatedRepository::new(db.connection()).query_by_race(race_id)
    }

    /// Latest imported snapshot of every checkpoint of a race
    pub async fn snapshots(&self, race_id: &RaceId) -> Result<Vec<ImportedCheckpointSnapshot>> {
        let db = self.db.lock().await;
        SqliteSnapshotRepository::new(db.connection()).query_by_race(race_id)
    }

    pub async fn matrix(&self, race_id: &RaceId) -> Result<AggregationMatrix> {
        Ok(build_matrix(&self.snapshots(race_id).await?))
    }

    /// Raw records of one checkpoint's latest import, `None` if never imported
    pub async fn drilldown(
        &self,
        race_id: &RaceId,
        checkpoint_number: u32,
    ) -> Result<Option<Vec<SightingRecord>>> {
        Ok(drilldown(&self.snapshots(race_id).await?, checkpoint_number))
    }

    /// Package the consolidated records of a race for another base station
    pub async fn export_race(&self, race_id: &RaceId) -> Result<ExportPackage> {
        let db = self.db.lock().await;
        require_race(&db, race_id)?;
        let records = SqliteConsolidatedRepository::new(db.connection())
            .query_by_race(race_id)?
            .into_iter()
            .map(|consolidated| consolidated.record)
            .collect::<Vec<_>>();
        tracing::info!("Exporting {} consolidated records of race '{race_id}'", records.len());
        Ok(encode_race(race_id, &records))
    }
}
