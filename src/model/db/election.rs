use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::common::election::{ElectionId, Schedule, ScheduleError};

/// Core election data, as stored in the database.
///
/// Dates are kept as the raw strings the store holds, since other clients of the
/// store write them too; they are only interpreted when loaded into an [`Election`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election name.
    pub name: String,
    /// Nominal election type, e.g. "General".
    pub election_type: String,
    #[serde(default)]
    pub description: Option<String>,
    /// The election day, used when there is no complete voting window.
    #[serde(default)]
    pub election_date: Option<String>,
    /// Explicit voting window.
    #[serde(default)]
    pub schedule: Option<ScheduleWindow>,
    /// Opens voting ahead of the scheduled window.
    #[serde(default)]
    pub is_active: bool,
    /// Holds voting open after the scheduled window has closed.
    #[serde(default)]
    pub voting_override: Option<VotingOverride>,
    /// Identity of the admin who created the election.
    pub created_by: String,
}

/// A new election ready for DB insertion.
pub type NewElection = ElectionCore;

/// The explicit schedule sub-record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    #[serde(default)]
    pub nomination_end: Option<String>,
    #[serde(default)]
    pub voting_start: Option<String>,
    #[serde(default)]
    pub voting_end: Option<String>,
}

/// An explicit administrative decision to accept votes after the window has closed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingOverride {
    pub granted_by: String,
    pub reason: String,
    pub granted_at: DateTime<Utc>,
}

/// An election row from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionRecord {
    #[serde(rename = "_id")]
    pub id: ElectionId,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for ElectionRecord {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for ElectionRecord {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}

/// A loaded election, with its schedule resolved.
#[derive(Debug, Clone)]
pub struct Election {
    record: ElectionRecord,
    schedule: Result<Schedule, ScheduleError>,
}

impl Election {
    /// The resolved schedule, or why the stored dates could not be used.
    pub fn schedule(&self) -> Result<&Schedule, &ScheduleError> {
        self.schedule.as_ref()
    }

    pub fn into_record(self) -> ElectionRecord {
        self.record
    }
}

impl From<ElectionRecord> for Election {
    fn from(record: ElectionRecord) -> Self {
        let window = record.schedule.clone().unwrap_or_default();
        let schedule = Schedule::from_fields(
            record.election_date.as_deref(),
            window.nomination_end.as_deref(),
            window.voting_start.as_deref(),
            window.voting_end.as_deref(),
        );
        Self { record, schedule }
    }
}

impl Deref for Election {
    type Target = ElectionRecord;

    fn deref(&self) -> &Self::Target {
        &self.record
    }
}
