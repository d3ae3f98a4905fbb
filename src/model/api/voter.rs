use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{common::election::VoterId, db::Voter};

/// Details a signed-in user supplies to become a registered voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterRegistration {
    pub full_name: String,
}

/// An API-friendly voter description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterDescription {
    pub id: VoterId,
    pub email: String,
    pub full_name: String,
    pub registered_at: DateTime<Utc>,
    pub last_vote_at: Option<DateTime<Utc>>,
    pub is_verified: bool,
}

impl From<Voter> for VoterDescription {
    fn from(voter: Voter) -> Self {
        Self {
            id: voter.id,
            email: voter.voter.email,
            full_name: voter.voter.full_name,
            registered_at: voter.voter.registered_at,
            last_vote_at: voter.voter.last_vote_at,
            is_verified: voter.voter.is_verified,
        }
    }
}
