//! Checkpoint-side operations over the local sighting store.

use chrono::{DateTime, Utc};

use super::database::{require_race, DatabaseService};
use crate::db::{
    Database, SettingsRepository, SightingRepository, SqliteAuditLog, SqliteSettingsRepository,
    SqliteSightingRepository,
};
use crate::error::{Error, Result};
use crate::export::{encode_checkpoint, ExportPackage};
use crate::models::{
    AuditEntry, RaceId, RunnerStatus, SightingKey, SightingRecord, TimeSegment,
};
use crate::segment::TimeSegmenter;
use crate::util::{normalize_text_option, truncate_to_ms};

/// A checkpoint operator's view of a store
#[derive(Clone)]
pub struct CheckpointService {
    db: DatabaseService,
}

impl CheckpointService {
    #[must_use]
    pub const fn new(db: DatabaseService) -> Self {
        Self { db }
    }

    /// Create or update the current record for a runner.
    ///
    /// A `passed` status without a time is stamped with the current time.
    /// Call-in state carries over from the record being replaced.
    pub async fn record_sighting(
        &self,
        key: SightingKey,
        status: RunnerStatus,
        mark_off_time: Option<DateTime<Utc>>,
        notes: Option<String>,
    ) -> Result<SightingRecord> {
        validate_numbers(key.checkpoint_number, key.runner_number)?;

        let mark_off_time = match (status, mark_off_time) {
            (_, Some(at)) => Some(truncate_to_ms(at)),
            (RunnerStatus::Passed, None) => Some(truncate_to_ms(Utc::now())),
            (_, None) => None,
        };

        let db = self.db.lock().await;
        require_race(&db, &key.race_id)?;

        let mut record = SightingRecord::new(key.race_id, key.checkpoint_number, key.runner_number)
            .with_status(status, mark_off_time);
        record.notes = normalize_text_option(notes);

        let tx = db.connection().unchecked_transaction()?;
        let repo = SqliteSightingRepository::new(&tx);
        if let Some(current) = repo.get(&record.key())? {
            record.called_in = current.called_in;
            record.call_in_time = current.call_in_time;
        }
        let previous = repo.put(&record)?;
        tx.commit()?;

        if previous.is_some() {
            tracing::info!("Updated sighting {}", record.key());
        } else {
            tracing::info!("Recorded sighting {}", record.key());
        }
        Ok(record)
    }

    /// Soft delete a runner's current record
    pub async fn remove_sighting(&self, key: &SightingKey) -> Result<SightingRecord> {
        let db = self.db.lock().await;
        let tx = db.connection().unchecked_transaction()?;
        let removed = SqliteSightingRepository::new(&tx).soft_delete(key)?;
        tx.commit()?;
        tracing::info!("Removed sighting {key}");
        Ok(removed)
    }

    /// Current records at a checkpoint, sorted by runner
    pub async fn list_sightings(
        &self,
        race_id: &RaceId,
        checkpoint_number: u32,
    ) -> Result<Vec<SightingRecord>> {
        let db = self.db.lock().await;
        SqliteSightingRepository::new(db.connection()).list_checkpoint(race_id, checkpoint_number)
    }

    /// Group a checkpoint's passed runners into time segments
    pub async fn segments(
        &self,
        race_id: &RaceId,
        checkpoint_number: u32,
    ) -> Result<Vec<TimeSegment>> {
        let db = self.db.lock().await;
        let (segmenter, records) = load_segment_input(&db, race_id, checkpoint_number)?;
        Ok(segmenter.segment(&records))
    }

    /// Flag every member of the labelled segment as called in.
    ///
    /// Returns how many records changed; an unknown label changes nothing.
    pub async fn mark_segment_called_in(
        &self,
        race_id: &RaceId,
        checkpoint_number: u32,
        label: &str,
    ) -> Result<usize> {
        let db = self.db.lock().await;
        let (segmenter, records) = load_segment_input(&db, race_id, checkpoint_number)?;
        let members = segmenter.members_with_label(&records, label.trim());
        if members.is_empty() {
            tracing::warn!("No segment labelled '{label}' at checkpoint {checkpoint_number}");
            return Ok(0);
        }

        let tx = db.connection().unchecked_transaction()?;
        let repo = SqliteSightingRepository::new(&tx);
        let mut updated = 0;
        for key in &members {
            if repo.mark_called_in(key)? {
                updated += 1;
            }
        }
        tx.commit()?;

        tracing::info!(
            "Marked {updated} of {} runners called in for segment {label}",
            members.len()
        );
        Ok(updated)
    }

    /// Package the checkpoint's full current record set for transport
    pub async fn export_checkpoint(
        &self,
        race_id: &RaceId,
        checkpoint_number: u32,
    ) -> Result<ExportPackage> {
        let db = self.db.lock().await;
        require_race(&db, race_id)?;
        let records = SqliteSightingRepository::new(db.connection())
            .list_checkpoint(race_id, checkpoint_number)?;
        tracing::info!(
            "Exporting {} runners from checkpoint {checkpoint_number} of race '{race_id}'",
            records.len()
        );
        Ok(encode_checkpoint(race_id, checkpoint_number, &records))
    }

    /// Archived prior values, newest first
    pub async fn audit_trail(&self, race_id: &RaceId, limit: usize) -> Result<Vec<AuditEntry>> {
        let db = self.db.lock().await;
        SqliteAuditLog::new(db.connection()).list(race_id, limit)
    }
}

fn validate_numbers(checkpoint_number: u32, runner_number: u32) -> Result<()> {
    if checkpoint_number == 0 {
        return Err(Error::InvalidInput("checkpoint number must be at least 1".to_string()));
    }
    if runner_number == 0 {
        return Err(Error::InvalidInput("runner number must be at least 1".to_string()));
    }
    Ok(())
}

fn load_segment_input(
    db: &Database,
    race_id: &RaceId,
    checkpoint_number: u32,
) -> Result<(TimeSegmenter, Vec<SightingRecord>)> {
    let race = require_race(db, race_id)?;
    let settings = SqliteSettingsRepository::new(db.connection()).load()?;
    let records =
        SqliteSightingRepository::new(db.connection()).list_checkpoint(race_id, checkpoint_number)?;
    let segmenter = TimeSegmenter::new(race.start_time).with_bucket_width(settings.bucket_width());
    Ok((segmenter, records))
}
