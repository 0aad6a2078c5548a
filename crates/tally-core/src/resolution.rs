//! Conflict resolution workflow.
//!
//! A [`ResolutionSession`] is built fresh for each import's conflict batch
//! and consumed on submit. It holds one decision per conflict and only yields
//! a [`WriteSet`] once every conflict has been decided.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Conflict, ConsolidatedRecord};

/// Which version of a conflicting record to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Choice {
    Existing,
    Incoming,
}

impl Choice {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Existing => "existing",
            Self::Incoming => "incoming",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "existing" | "keep" => Ok(Self::Existing),
            "incoming" | "take" => Ok(Self::Incoming),
            other => Err(Error::InvalidInput(format!(
                "invalid choice '{other}', expected 'existing' or 'incoming'"
            ))),
        }
    }
}

/// Where a batch stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    Collecting { decided: usize, total: usize },
    Resolved,
}

/// One chosen version, ready for the commit path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedWrite {
    pub conflict_id: String,
    pub choice: Choice,
    /// Version to store
    pub record: ConsolidatedRecord,
    /// Stored version at detection time
    pub replaced: ConsolidatedRecord,
}

/// Writes emitted by a fully decided batch, in conflict order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    pub writes: Vec<ResolvedWrite>,
}

impl WriteSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }
}

#[derive(Debug, Clone)]
pub struct ResolutionSession {
    conflicts: Vec<Conflict>,
    decisions: HashMap<String, Choice>,
}

impl ResolutionSession {
    #[must_use]
    pub fn new(conflicts: Vec<Conflict>) -> Self {
        Self {
            conflicts,
            decisions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    /// Record a decision; deciding again replaces the earlier choice
    pub fn decide(&mut self, conflict_id: &str, choice: Choice) -> Result<()> {
        if !self.conflicts.iter().any(|conflict| conflict.id == conflict_id) {
            return Err(Error::UnknownConflict(conflict_id.to_string()));
        }
        self.decisions.insert(conflict_id.to_string(), choice);
        Ok(())
    }

    /// Apply the same choice to every conflict in the batch
    pub fn decide_all(&mut self, choice: Choice) {
        for conflict in &self.conflicts {
            self.decisions.insert(conflict.id.clone(), choice);
        }
    }

    #[must_use]
    pub fn decision(&self, conflict_id: &str) -> Option<Choice> {
        self.decisions.get(conflict_id).copied()
    }

    /// Conflicts still waiting for a decision
    pub fn undecided(&self) -> impl Iterator<Item = &Conflict> {
        self.conflicts
            .iter()
            .filter(|conflict| !self.decisions.contains_key(&conflict.id))
    }

    #[must_use]
    pub fn state(&self) -> ResolutionState {
        let decided = self.decisions.len();
        let total = self.conflicts.len();
        if decided == total {
            ResolutionState::Resolved
        } else {
            ResolutionState::Collecting { decided, total }
        }
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == ResolutionState::Resolved
    }

    /// Emit the write-set, or hand the session back if anything is undecided
    pub fn submit(self) -> std::result::Result<WriteSet, Self> {
        if !self.is_ready() {
            tracing::debug!(
                "Refusing to submit with {} undecided conflicts",
                self.undecided().count()
            );
            return Err(self);
        }

        let Self {
            conflicts,
            decisions,
        } = self;

        let mut writes = Vec::with_capacity(conflicts.len());
        for conflict in conflicts {
            let Some(choice) = decisions.get(&conflict.id).copied() else {
                continue;
            };
            let record = match choice {
                Choice::Existing => conflict.existing.clone(),
                Choice::Incoming => conflict.incoming,
            };
            writes.push(ResolvedWrite {
                conflict_id: conflict.id,
                choice,
                record,
                replaced: conflict.existing,
            });
        }

        Ok(WriteSet { writes })
    }
}
