//! An in-process [`Store`] with the same uniqueness guarantees as the real one, for tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rocket::tokio::time::sleep;

use super::{Store, StoreError, StoreResult};
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

#[derive(Default)]
struct Tables {
    next_id: u32,
    elections: BTreeMap<ElectionId, ElectionRecord>,
    candidates: BTreeMap<CandidateId, Candidate>,
    contests: BTreeMap<u32, Contest>,
    voters: BTreeMap<VoterId, Voter>,
    votes: BTreeMap<VoteId, Vote>,
    audit: Vec<AuditEntry>,
}

impl Tables {
    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
struct Faults {
    unavailable: AtomicBool,
    stale_vote_reads: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

/// Cloning shares the underlying tables.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    faults: Arc<Faults>,
}

impl MemoryStore {
    /// Make every subsequent request fail as if the store were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every subsequent request take at least this long.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.faults.latency.lock().unwrap() = latency;
    }

    /// Make prior-vote lookups miss, as if racing requests had not yet seen each other's writes.
    pub fn set_stale_vote_reads(&self, stale: bool) {
        self.faults.stale_vote_reads.store(stale, Ordering::SeqCst);
    }

    /// Total committed votes, for assertions.
    pub fn vote_count(&self) -> usize {
        self.tables().votes.len()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    async fn round_trip(&self) -> StoreResult<()> {
        let latency = *self.faults.latency.lock().unwrap();
        if let Some(latency) = latency {
            sleep(latency).await;
        }
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("connection refused".to_string()));
        }
        Ok(())
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn election(&self, id: ElectionId) -> StoreResult<Option<ElectionRecord>> {
        self.round_trip().await?;
        Ok(self.tables().elections.get(&id).cloned())
    }

    async fn elections(&self) -> StoreResult<Vec<ElectionRecord>> {
        self.round_trip().await?;
        Ok(self.tables().elections.values().cloned().collect())
    }

    async fn insert_election(&self, election: NewElection) -> StoreResult<ElectionRecord> {
        self.round_trip().await?;
        let mut tables = self.tables();
        let id = tables.next_id();
        let record = ElectionRecord { id, election };
        tables.elections.insert(id, record.clone());
        Ok(record)
    }

    async fn set_election_active(&self, id: ElectionId, is_active: bool) -> StoreResult<bool> {
        self.round_trip().await?;
        Ok(match self.tables().elections.get_mut(&id) {
            Some(election) => {
                election.is_active = is_active;
                true
            }
            None => false,
        })
    }

    async fn set_voting_override(
        &self,
        id: ElectionId,
        grant: Option<VotingOverride>,
    ) -> StoreResult<bool> {
        self.round_trip().await?;
        Ok(match self.tables().elections.get_mut(&id) {
            Some(election) => {
                election.voting_override = grant;
                true
            }
            None => false,
        })
    }

    async fn delete_election(&self, id: ElectionId) -> StoreResult<bool> {
        self.round_trip().await?;
        let mut tables = self.tables();
        if tables.elections.remove(&id).is_none() {
            return Ok(false);
        }
        tables.candidates.retain(|_, c| c.election_id != id);
        tables.contests.retain(|_, c| c.election_id != id);
        Ok(true)
    }

    async fn candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>> {
        self.round_trip().await?;
        Ok(self.tables().candidates.get(&id).cloned())
    }

    async fn candidates(&self, election_id: ElectionId) -> StoreResult<Vec<Candidate>> {
        self.round_trip().await?;
        Ok(self
            .tables()
            .candidates
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        self.round_trip().await?;
        let mut tables = self.tables();
        let id = tables.next_id();
        let candidate = Candidate { id, candidate };
        tables.candidates.insert(id, candidate.clone());
        Ok(candidate)
    }

    async fn set_candidate_status(
        &self,
        id: CandidateId,
        status: CandidateStatus,
    ) -> StoreResult<bool> {
        self.round_trip().await?;
        Ok(match self.tables().candidates.get_mut(&id) {
            Some(candidate) => {
                candidate.status = status;
                true
            }
            None => false,
        })
    }

    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<bool> {
        self.round_trip().await?;
        let mut tables = self.tables();
        let removed = tables.candidates.remove(&id).is_some();
        tables.contests.retain(|_, c| c.candidate_id != id);
        Ok(removed)
    }

    async fn contest(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> StoreResult<Option<Contest>> {
        self.round_trip().await?;
        Ok(self
            .tables()
            .contests
            .values()
            .find(|c| c.election_id == election_id && c.candidate_id == candidate_id)
            .cloned())
    }

    async fn contests(&self, election_id: ElectionId) -> StoreResult<Vec<Contest>> {
        self.round_trip().await?;
        Ok(self
            .tables()
            .contests
            .values()
            .filter(|c| c.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn insert_contest(&self, contest: NewContest) -> StoreResult<Contest> {
        self.round_trip().await?;
        let mut tables = self.tables();
        let exists = tables
            .contests
            .values()
            .any(|c| c.election_id == contest.election_id && c.candidate_id == contest.candidate_id);
        if exists {
            return Err(StoreError::Conflict(format!(
                "contest for candidate {} in election {}",
                contest.candidate_id, contest.election_id
            )));
        }
        let id = tables.next_id();
        let contest = Contest { id, contest };
        tables.contests.insert(id, contest.clone());
        Ok(contest)
    }

    async fn delete_contests_for(&self, candidate_id: CandidateId) -> StoreResult<u64> {
        self.round_trip().await?;
        let mut tables = self.tables();
        let before = tables.contests.len();
        tables.contests.retain(|_, c| c.candidate_id != candidate_id);
        Ok((before - tables.contests.len()) as u64)
    }

    async fn voter(&self, id: VoterId) -> StoreResult<Option<Voter>> {
        self.round_trip().await?;
        Ok(self.tables().voters.get(&id).cloned())
    }

    async fn voter_by_email(&self, email: &str) -> StoreResult<Option<Voter>> {
        self.round_trip().await?;
        Ok(self
            .tables()
            .voters
            .values()
            .find(|v| v.email == email)
            .cloned())
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        self.round_trip().await?;
        let mut tables = self.tables();
        if tables.voters.values().any(|v| v.email == voter.email) {
            return Err(StoreError::Conflict(format!("voter {}", voter.email)));
        }
        let id = tables.next_id();
        let voter = Voter { id, voter };
        tables.voters.insert(id, voter.clone());
        Ok(voter)
    }

    async fn set_last_vote(&self, id: VoterId, at: DateTime<Utc>) -> StoreResult<()> {
        self.round_trip().await?;
        if let Some(voter) = self.tables().voters.get_mut(&id) {
            voter.last_vote_at = Some(at);
        }
        Ok(())
    }

    async fn voters(&self, skip: u64, limit: u32) -> StoreResult<(Vec<Voter>, u64)> {
        self.round_trip().await?;
        let tables = self.tables();
        let mut voters: Vec<_> = tables.voters.values().cloned().collect();
        voters.sort_by(|a, b| b.registered_at.cmp(&a.registered_at).then(b.id.cmp(&a.id)));
        let total = voters.len() as u64;
        let page = voters
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn set_voter_verified(&self, id: VoterId) -> StoreResult<bool> {
        self.round_trip().await?;
        Ok(match self.tables().voters.get_mut(&id) {
            Some(voter) => {
                voter.is_verified = true;
                true
            }
            None => false,
        })
    }

    async fn vote(&self, id: VoteId) -> StoreResult<Option<Vote>> {
        self.round_trip().await?;
        Ok(self.tables().votes.get(&id).cloned())
    }

    async fn vote_by(
        &self,
        voter_id: VoterId,
        election_id: ElectionId,
    ) -> StoreResult<Option<Vote>> {
        self.round_trip().await?;
        if self.faults.stale_vote_reads.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self
            .tables()
            .votes
            .values()
            .find(|v| v.voter_id == voter_id && v.election_id == election_id)
            .cloned())
    }

    async fn votes(&self, election_id: ElectionId) -> StoreResult<Vec<Vote>> {
        self.round_trip().await?;
        Ok(self
            .tables()
            .votes
            .values()
            .filter(|v| v.election_id == election_id)
            .cloned()
            .collect())
    }

    async fn votes_by_voter(&self, voter_id: VoterId) -> StoreResult<Vec<Vote>> {
        self.round_trip().await?;
        let mut votes: Vec<_> = self
            .tables()
            .votes
            .values()
            .filter(|v| v.voter_id == voter_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| b.cast_at.cmp(&a.cast_at).then(b.id.cmp(&a.id)));
        Ok(votes)
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        self.round_trip().await?;
        let mut tables = self.tables();
        let exists = tables
            .votes
            .values()
            .any(|v| v.voter_id == vote.voter_id && v.election_id == vote.election_id);
        if exists {
            return Err(StoreError::Conflict(format!(
                "vote by voter {} in election {}",
                vote.voter_id, vote.election_id
            )));
        }
        let id = tables.next_id();
        let vote = Vote { id, vote };
        tables.votes.insert(id, vote.clone());
        Ok(vote)
    }

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry> {
        self.round_trip().await?;
        let mut tables = self.tables();
        let id = tables.next_id();
        let entry = AuditEntry { id, entry };
        tables.audit.push(entry.clone());
        Ok(entry)
    }

    async fn audit_log(&self, skip: u64, limit: u32) -> StoreResult<(Vec<AuditEntry>, u64)> {
        self.round_trip().await?;
        let tables = self.tables();
        let page = tables
            .audit
            .iter()
            .rev()
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect();
        Ok((page, tables.audit.len() as u64))
    }
}
