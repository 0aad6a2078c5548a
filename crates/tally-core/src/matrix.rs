//! Runner by checkpoint aggregation over imported snapshots

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::models::{ImportedCheckpointSnapshot, RunnerStatus, SightingRecord};

/// One matrix cell. `Absent` means the checkpoint never reported the runner,
/// which is not the same as `Status(NotStarted)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind", content = "status")]
pub enum Cell {
    Status(RunnerStatus),
    Absent,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => f.write_str(status.as_str()),
            Self::Absent => f.write_str("-"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregationMatrix {
    /// Sorted checkpoint axis
    pub checkpoints: Vec<u32>,
    /// Sorted union of every runner seen at any checkpoint
    pub runners: Vec<u32>,
    #[serde(skip)]
    cells: BTreeMap<(u32, u32), RunnerStatus>,
}

impl AggregationMatrix {
    #[must_use]
    pub fn cell(&self, checkpoint_number: u32, runner_number: u32) -> Cell {
        self.cells
            .get(&(checkpoint_number, runner_number))
            .copied()
            .map_or(Cell::Absent, Cell::Status)
    }

    /// Cells for one runner across the checkpoint axis
    #[must_use]
    pub fn row(&self, runner_number: u32) -> Vec<Cell> {
        self.checkpoints
            .iter()
            .map(|&checkpoint| self.cell(checkpoint, runner_number))
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}

#[must_use]
pub fn build_matrix(snapshots: &[ImportedCheckpointSnapshot]) -> AggregationMatrix {
    let mut checkpoints = BTreeSet::new();
    let mut runners = BTreeSet::new();
    let mut cells = BTreeMap::new();

    for snapshot in snapshots {
        checkpoints.insert(snapshot.checkpoint_number);
        for record in &snapshot.runners {
            runners.insert(record.runner_number);
            cells.insert(
                (snapshot.checkpoint_number, record.runner_number),
                record.status,
            );
        }
    }

    AggregationMatrix {
        checkpoints: checkpoints.into_iter().collect(),
        runners: runners.into_iter().collect(),
        cells,
    }
}

/// Raw records of one checkpoint's snapshot, sorted by runner
#[must_use]
pub fn drilldown(
    snapshots: &[ImportedCheckpointSnapshot],
    checkpoint_number: u32,
) -> Option<Vec<SightingRecord>> {
    let snapshot = snapshots
        .iter()
        .find(|snapshot| snapshot.checkpoint_number == checkpoint_number)?;

    let mut records = snapshot.runners.clone();
    records.sort_by_key(|record| record.runner_number);
    Some(records)
}
