use std::fmt::{Display, Formatter};

use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the candidate approval lifecycle.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateStatus {
    /// Awaiting an admin decision.
    #[default]
    Pending,
    /// Contesting the election.
    Approved,
    /// Turned down by an admin.
    Rejected,
}

impl Display for CandidateStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        };
        write!(f, "{name}")
    }
}

impl From<CandidateStatus> for Bson {
    fn from(status: CandidateStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

/// The party suffix older admin screens appended to mark approval.
pub const LEGACY_APPROVAL_SUFFIX: &str = " - APPROVED";

/// Derive an explicit status for a candidate stored before the status field existed.
///
/// Returns the status together with the party label stripped of any legacy approval marker.
pub fn legacy_status(party: Option<&str>, has_contest: bool) -> (CandidateStatus, Option<String>) {
    if let Some(party) = party {
        if let Some(stripped) = party.strip_suffix(LEGACY_APPROVAL_SUFFIX) {
            let stripped = stripped.trim();
            let party = (!stripped.is_empty()).then(|| stripped.to_string());
            return (CandidateStatus::Approved, party);
        }
    }
    let status = if has_contest {
        CandidateStatus::Approved
    } else {
        CandidateStatus::Pending
    };
    (status, party.map(str::to_string))
}
