use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    common::election::{CandidateId, ElectionId, VoteId},
    db::{Candidate, Contest, ElectionRecord, Vote},
};

/// A voter's choice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CastRequest {
    pub candidate_id: CandidateId,
}

/// Proof to the voter that their vote was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub vote_id: VoteId,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            vote_id: vote.id,
            election_id: vote.election_id,
            candidate_id: vote.candidate_id,
            cast_at: vote.cast_at,
        }
    }
}

/// Whether the signed-in voter has voted in an election.
///
/// Advisory only: a vote may land between this answer and the next cast attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteStatus {
    pub election_id: ElectionId,
    pub has_voted: bool,
    pub receipt: Option<VoteReceipt>,
}

/// One line of a voter's voting history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteHistoryEntry {
    pub vote_id: VoteId,
    pub election_id: ElectionId,
    pub election_name: String,
    pub election_type: String,
    pub election_date: Option<String>,
    pub candidate_id: CandidateId,
    pub candidate_name: String,
    pub party: Option<String>,
    pub position: Option<String>,
    pub cast_at: DateTime<Utc>,
}

impl VoteHistoryEntry {
    pub fn new(
        vote: Vote,
        election: ElectionRecord,
        candidate: Candidate,
        contest: Option<Contest>,
    ) -> Self {
        Self {
            vote_id: vote.id,
            election_id: election.id,
            election_name: election.election.name,
            election_type: election.election.election_type,
            election_date: election.election.election_date,
            candidate_id: candidate.id,
            candidate_name: candidate.candidate.full_name,
            party: candidate.candidate.party,
            position: contest.map(|c| c.contest.position),
            cast_at: vote.cast_at,
        }
    }
}
