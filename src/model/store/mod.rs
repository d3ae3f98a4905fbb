//! The external store: the only persistence mechanism, and the authority on uniqueness.

use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rocket::tokio::time::timeout;
use thiserror::Error;

use crate::model::{
    common::{
        candidate::CandidateStatus,
        election::{CandidateId, ElectionId, VoteId, VoterId},
    },
    db::{
        AuditEntry, Candidate, Contest, ElectionRecord, NewAuditEntry, NewCandidate, NewContest,
        NewElection, NewVote, NewVoter, Vote, Voter, VotingOverride,
    },
};

#[cfg(test)]
pub mod memory;

/// Ways a store round trip can fail.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The store refused a write that would break one of its uniqueness constraints.
    #[error("uniqueness constraint violated: {0}")]
    Conflict(String),
    /// The store could not be reached, or failed the request.
    #[error("store request failed: {0}")]
    Backend(String),
    /// The store did not answer in time.
    #[error("store did not respond within {0:?}")]
    Timeout(Duration),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations consumed from the external store.
///
/// Implementations must enforce uniqueness of voter email, of (election, candidate)
/// contests, and of (voter, election) votes, reporting violations as
/// [`StoreError::Conflict`].
#[rocket::async_trait]
pub trait Store: Send + Sync {
    async fn election(&self, id: ElectionId) -> StoreResult<Option<ElectionRecord>>;
    async fn elections(&self) -> StoreResult<Vec<ElectionRecord>>;
    async fn insert_election(&self, election: NewElection) -> StoreResult<ElectionRecord>;
    async fn set_election_active(&self, id: ElectionId, is_active: bool) -> StoreResult<bool>;
    async fn set_voting_override(
        &self,
        id: ElectionId,
        grant: Option<VotingOverride>,
    ) -> StoreResult<bool>;
    /// Delete an election together with its candidates and contests.
    async fn delete_election(&self, id: ElectionId) -> StoreResult<bool>;

    async fn candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>>;
    async fn candidates(&self, election_id: ElectionId) -> StoreResult<Vec<Candidate>>;
    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate>;
    async fn set_candidate_status(
        &self,
        id: CandidateId,
        status: CandidateStatus,
    ) -> StoreResult<bool>;
    /// Delete a candidate together with its contests.
    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<bool>;

    async fn contest(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> StoreResult<Option<Contest>>;
    async fn contests(&self, election_id: ElectionId) -> StoreResult<Vec<Contest>>;
    async fn insert_contest(&self, contest: NewContest) -> StoreResult<Contest>;
    async fn delete_contests_for(&self, candidate_id: CandidateId) -> StoreResult<u64>;

    async fn voter(&self, id: VoterId) -> StoreResult<Option<Voter>>;
    async fn voter_by_email(&self, email: &str) -> StoreResult<Option<Voter>>;
    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter>;
    async fn set_last_vote(&self, id: VoterId, at: DateTime<Utc>) -> StoreResult<()>;
    /// A page of voters, most recently registered first, and the total number of voters.
    async fn voters(&self, skip: u64, limit: u32) -> StoreResult<(Vec<Voter>, u64)>;
    async fn set_voter_verified(&self, id: VoterId) -> StoreResult<bool>;

    async fn vote(&self, id: VoteId) -> StoreResult<Option<Vote>>;
    async fn vote_by(&self, voter_id: VoterId, election_id: ElectionId)
        -> StoreResult<Option<Vote>>;
    async fn votes(&self, election_id: ElectionId) -> StoreResult<Vec<Vote>>;
    /// Every vote cast by one voter, most recent first.
    async fn votes_by_voter(&self, voter_id: VoterId) -> StoreResult<Vec<Vote>>;
    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote>;

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry>;
    /// A page of the audit log, newest first, and the total number of entries.
    async fn audit_log(&self, skip: u64, limit: u32) -> StoreResult<(Vec<AuditEntry>, u64)>;
}

/// Bound a store round trip by `limit`.
pub async fn timed<T, F>(limit: Duration, request: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

/// The managed handle on the store, carrying the per-request timeout.
#[derive(Clone)]
pub struct StoreHandle {
    store: Arc<dyn Store>,
    timeout: Duration,
}

impl StoreHandle {
    pub fn new(store: Arc<dyn Store>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Run one store round trip under this handle's timeout.
    pub async fn run<T, F>(&self, request: F) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>>,
    {
        timed(self.timeout, request).await
    }
}

impl Deref for StoreHandle {
    type Target = dyn Store;

    fn deref(&self) -> &Self::Target {
        self.store.as_ref()
    }
}
