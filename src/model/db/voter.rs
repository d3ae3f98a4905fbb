use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::common::election::VoterId;

/// Core voter data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// The authenticated identity this voter belongs to. Unique.
    pub email: String,
    pub full_name: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
    /// When this voter last cast a vote in any election. Informational only.
    #[serde(default)]
    pub last_vote_at: Option<DateTime<Utc>>,
    /// Set by an admin once the voter's details have been checked.
    #[serde(default)]
    pub is_verified: bool,
}

impl VoterCore {
    /// Create a new voter, registered now.
    pub fn new(email: String, full_name: String) -> Self {
        Self {
            email,
            full_name,
            registered_at: Utc::now(),
            last_vote_at: None,
            is_verified: false,
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: VoterId,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}
