use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        candidate::CandidateStatus,
        election::{CandidateId, ElectionId},
    },
    db::{Candidate, Contest, NewCandidate},
};

/// A candidate created directly by an admin. Such candidates are approved immediately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub full_name: String,
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub manifesto: Option<String>,
    /// The position contested, e.g. "Mayor".
    pub position: String,
}

impl CandidateSpec {
    pub fn into_new_candidate(self, election_id: ElectionId) -> Result<(NewCandidate, String)> {
        if self.full_name.trim().is_empty() {
            return Err(Error::bad_request("Candidate name must not be empty"));
        }
        if self.position.trim().is_empty() {
            return Err(Error::bad_request("Contested position must not be empty"));
        }
        let candidate = NewCandidate {
            election_id,
            full_name: self.full_name,
            party: self.party,
            symbol: self.symbol,
            photo_url: self.photo_url,
            manifesto: self.manifesto,
            applicant: None,
            status: CandidateStatus::Approved,
        };
        Ok((candidate, self.position))
    }
}

/// A voter's application to stand in an election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidacyApplication {
    #[serde(default)]
    pub party: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub manifesto: Option<String>,
}

impl CandidacyApplication {
    /// A pending candidate for the applying voter.
    pub fn into_new_candidate(
        self,
        election_id: ElectionId,
        applicant: &str,
        full_name: &str,
    ) -> NewCandidate {
        NewCandidate {
            election_id,
            full_name: full_name.to_string(),
            party: self.party,
            symbol: self.symbol,
            photo_url: self.photo_url,
            manifesto: self.manifesto,
            applicant: Some(applicant.to_string()),
            status: CandidateStatus::Pending,
        }
    }
}

/// An admin's approval of a pending candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub position: String,
}

/// An API-friendly candidate description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: CandidateId,
    pub election_id: ElectionId,
    pub full_name: String,
    pub party: Option<String>,
    pub symbol: Option<String>,
    pub photo_url: Option<String>,
    pub manifesto: Option<String>,
    pub status: CandidateStatus,
    /// The position contested; only set for approved candidates.
    pub position: Option<String>,
}

impl CandidateDescription {
    /// Describe `candidate`, taking its position from whichever of `contests` is theirs.
    pub fn new(candidate: Candidate, contests: &[Contest]) -> Self {
        let position = contests
            .iter()
            .find(|c| c.candidate_id == candidate.id)
            .map(|c| c.position.clone());
        Self {
            id: candidate.id,
            election_id: candidate.candidate.election_id,
            full_name: candidate.candidate.full_name,
            party: candidate.candidate.party,
            symbol: candidate.candidate.symbol,
            photo_url: candidate.candidate.photo_url,
            manifesto: candidate.candidate.manifesto,
            status: candidate.candidate.status,
            position,
        }
    }
}
