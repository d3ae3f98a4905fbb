use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

/// Administrative actions that are recorded in the audit log.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateElection,
    DeleteElection,
    SetElectionActive,
    GrantVotingOverride,
    RevokeVotingOverride,
    CreateCandidate,
    ApproveCandidate,
    RejectCandidate,
    DeleteCandidate,
    VerifyVoter,
}

/// One audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditEntry {
    /// Identity of the admin who acted.
    pub actor: String,
    pub action: AuditAction,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub at: DateTime<Utc>,
}

impl NewAuditEntry {
    pub fn now(actor: impl Into<String>, action: AuditAction, description: String) -> Self {
        Self {
            actor: actor.into(),
            action,
            description,
            at: Utc::now(),
        }
    }
}

/// An audit entry from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "_id")]
    pub id: u32,
    #[serde(flatten)]
    pub entry: NewAuditEntry,
}

impl Deref for AuditEntry {
    type Target = NewAuditEntry;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}
