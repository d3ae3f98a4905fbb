use chrono::{DateTime, NaiveDate, Utc};
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::Schedule,
    db::{NewElection, ScheduleWindow},
};

/// An election specification, as submitted by an admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    /// Election name.
    pub name: String,
    /// Nominal election type, e.g. "General".
    pub election_type: String,
    #[serde(default)]
    pub description: Option<String>,
    /// The election day.
    pub election_date: NaiveDate,
    /// Explicit voting window, overriding the election day.
    #[serde(default)]
    pub schedule: Option<ScheduleSpec>,
    /// Open voting straight away, ahead of the window.
    #[serde(default)]
    pub is_active: bool,
}

/// An explicit voting window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleSpec {
    /// When candidacy applications close.
    #[serde(default)]
    pub nomination_end: Option<DateTime<Utc>>,
    pub voting_start: DateTime<Utc>,
    pub voting_end: DateTime<Utc>,
}

impl ElectionSpec {
    /// Validate this spec and convert it into an election ready for insertion.
    pub fn into_new_election(self, created_by: &str) -> Result<NewElection> {
        if self.name.trim().is_empty() {
            return Err(Error::bad_request("Election name must not be empty"));
        }
        let schedule = match self.schedule {
            Some(spec) => {
                Schedule::explicit(spec.nomination_end, spec.voting_start, spec.voting_end)
                    .map_err(|e| Error::Status(Status::UnprocessableEntity, e.to_string()))?;
                Some(ScheduleWindow {
                    nomination_end: spec.nomination_end.map(|t| t.to_rfc3339()),
                    voting_start: Some(spec.voting_start.to_rfc3339()),
                    voting_end: Some(spec.voting_end.to_rfc3339()),
                })
            }
            None => None,
        };
        Ok(NewElection {
            name: self.name,
            election_type: self.election_type,
            description: self.description,
            election_date: Some(self.election_date.format("%Y-%m-%d").to_string()),
            schedule,
            is_active: self.is_active,
            voting_override: None,
            created_by: created_by.to_string(),
        })
    }
}
