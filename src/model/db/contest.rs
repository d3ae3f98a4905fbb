use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::common::election::{CandidateId, ContestId, ElectionId};

/// A candidate's standing in an election. Exists iff the candidate is approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestCore {
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    /// The position being contested, e.g. "Mayor".
    pub position: String,
}

/// A contest without an ID.
pub type NewContest = ContestCore;

/// A contest from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    #[serde(rename = "_id")]
    pub id: ContestId,
    #[serde(flatten)]
    pub contest: ContestCore,
}

impl Deref for Contest {
    type Target = ContestCore;

    fn deref(&self) -> &Self::Target {
        &self.contest
    }
}
