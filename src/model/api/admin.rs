use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::db::{AuditAction, AuditEntry};

/// Set or clear an election's `is_active` flag.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActiveFlag {
    pub is_active: bool,
}

/// A request to hold voting open after an election's window has closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideRequest {
    /// Recorded in the audit log. Required.
    pub reason: String,
}

/// An API-friendly audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditDescription {
    pub id: u32,
    pub actor: String,
    pub action: AuditAction,
    pub description: String,
    pub at: DateTime<Utc>,
}

impl From<AuditEntry> for AuditDescription {
    fn from(entry: AuditEntry) -> Self {
        Self {
            id: entry.id,
            actor: entry.entry.actor,
            action: entry.entry.action,
            description: entry.entry.description,
            at: entry.entry.at,
        }
    }
}
