use chrono::{DateTime, Utc};
use log::{info, warn};
use mongodb::{
    bson::{doc, to_bson, Bson, Document},
    options::FindOptions,
    Client, Database,
};
use rocket::futures::TryStreamExt;

use crate::model::{
    common::{
        candidate::{legacy_status, CandidateStatus},
        election::{CandidateId, ElectionId, VoteId, VoterId},
    },
    db::{
        AuditEntry, Candidate, Contest, ElectionRecord, NewAuditEntry, NewCandidate, NewContest,
        NewElection, NewVote, NewVoter, Vote, Voter, VotingOverride,
    },
    store::{Store, StoreError, StoreResult},
};

use super::collection::{
    Coll, MongoCollection, AUDIT_LOG, CANDIDATES, CONTESTS, ELECTIONS, VOTERS, VOTES,
};
use super::counter::Counter;

/// The MongoDB-backed [`Store`].
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    pub fn new(client: Client, db: Database) -> Self {
        Self { client, db }
    }

    fn coll<T: MongoCollection>(&self) -> Coll<T> {
        Coll::from_db(&self.db)
    }

    async fn next_id(&self, collection: &str) -> StoreResult<u32> {
        Counter::next(&self.coll(), collection).await
    }

    /// Give an explicit status to candidates stored before the status field existed.
    ///
    /// Candidates marked approved only by their party label also get the contest row they
    /// need to be voted for. Returns the number of candidates migrated. This operation is
    /// idempotent.
    pub async fn migrate_candidate_status(&self) -> StoreResult<u64> {
        let raw = self.db.collection::<Document>(CANDIDATES);
        let contests = self.db.collection::<Document>(CONTESTS);
        let mut cursor = raw
            .find(doc! { "status": { "$exists": false } }, None)
            .await?;

        let mut migrated = 0;
        while let Some(candidate) = cursor.try_next().await? {
            let (Some(id), Some(election_id)) = (
                candidate.get("_id").and_then(numeric_id),
                candidate.get("election_id").and_then(numeric_id),
            ) else {
                warn!("Skipping legacy candidate without usable IDs: {candidate}");
                continue;
            };
            let has_contest = contests
                .count_documents(doc! { "candidate_id": id }, None)
                .await?
                > 0;
            let (status, party) = legacy_status(candidate.get_str("party").ok(), has_contest);

            if status == CandidateStatus::Approved && !has_contest {
                let position = candidate
                    .get_str("position")
                    .ok()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .unwrap_or(LEGACY_DEFAULT_POSITION)
                    .to_string();
                self.insert_contest(NewContest {
                    election_id,
                    candidate_id: id,
                    position,
                })
                .await?;
            }
            raw.update_one(
                doc! { "_id": id },
                doc! { "$set": { "status": status, "party": party } },
                None,
            )
            .await?;
            migrated += 1;
        }
        if migrated > 0 {
            info!("Migrated {migrated} legacy candidate(s) to an explicit status");
        }
        Ok(migrated)
    }
}

/// Position given to legacy approved candidates that never had a contest row.
pub const LEGACY_DEFAULT_POSITION: &str = "Candidate";

/// Read an integer ID however the legacy writer stored it.
fn numeric_id(value: &Bson) -> Option<u32> {
    match *value {
        Bson::Int32(n) => u32::try_from(n).ok(),
        Bson::Int64(n) => u32::try_from(n).ok(),
        Bson::Double(n) if n.fract() == 0.0 && n >= 0.0 && n <= f64::from(u32::MAX) => {
            Some(n as u32)
        }
        _ => None,
    }
}

fn serialise<T: serde::Serialize>(value: &T) -> StoreResult<Bson> {
    to_bson(value).map_err(|e| StoreError::Backend(e.to_string()))
}

#[rocket::async_trait]
impl Store for MongoStore {
    async fn election(&self, id: ElectionId) -> StoreResult<Option<ElectionRecord>> {
        Ok(self
            .coll::<ElectionRecord>()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn elections(&self) -> StoreResult<Vec<ElectionRecord>> {
        let elections = self
            .coll::<ElectionRecord>()
            .find(None, None)
            .await?
            .try_collect()
            .await?;
        Ok(elections)
    }

    async fn insert_election(&self, election: NewElection) -> StoreResult<ElectionRecord> {
        let record = ElectionRecord {
            id: self.next_id(ELECTIONS).await?,
            election,
        };
        self.coll::<ElectionRecord>()
            .insert_one(&record, None)
            .await?;
        Ok(record)
    }

    async fn set_election_active(&self, id: ElectionId, is_active: bool) -> StoreResult<bool> {
        let result = self
            .coll::<ElectionRecord>()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "is_active": is_active } },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn set_voting_override(
        &self,
        id: ElectionId,
        grant: Option<VotingOverride>,
    ) -> StoreResult<bool> {
        let update = doc! { "$set": { "voting_override": serialise(&grant)? } };
        let result = self
            .coll::<ElectionRecord>()
            .update_one(doc! { "_id": id }, update, None)
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_election(&self, id: ElectionId) -> StoreResult<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = self
            .coll::<ElectionRecord>()
            .delete_one_with_session(doc! { "_id": id }, None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Ok(false);
        }

        let filter = doc! { "election_id": id };
        self.coll::<Candidate>()
            .delete_many_with_session(filter.clone(), None, &mut session)
            .await?;
        self.coll::<Contest>()
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(true)
    }

    async fn candidate(&self, id: CandidateId) -> StoreResult<Option<Candidate>> {
        Ok(self
            .coll::<Candidate>()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn candidates(&self, election_id: ElectionId) -> StoreResult<Vec<Candidate>> {
        let candidates = self
            .coll::<Candidate>()
            .find(doc! { "election_id": election_id }, None)
            .await?
            .try_collect()
            .await?;
        Ok(candidates)
    }

    async fn insert_candidate(&self, candidate: NewCandidate) -> StoreResult<Candidate> {
        let candidate = Candidate {
            id: self.next_id(CANDIDATES).await?,
            candidate,
        };
        self.coll::<Candidate>()
            .insert_one(&candidate, None)
            .await?;
        Ok(candidate)
    }

    async fn set_candidate_status(
        &self,
        id: CandidateId,
        status: CandidateStatus,
    ) -> StoreResult<bool> {
        let result = self
            .coll::<Candidate>()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "status": status } },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn delete_candidate(&self, id: CandidateId) -> StoreResult<bool> {
        let mut session = self.client.start_session(None).await?;
        session.start_transaction(None).await?;

        let result = self
            .coll::<Candidate>()
            .delete_one_with_session(doc! { "_id": id }, None, &mut session)
            .await?;
        self.coll::<Contest>()
            .delete_many_with_session(doc! { "candidate_id": id }, None, &mut session)
            .await?;

        session.commit_transaction().await?;
        Ok(result.deleted_count == 1)
    }

    async fn contest(
        &self,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> StoreResult<Option<Contest>> {
        let filter = doc! {
            "election_id": election_id,
            "candidate_id": candidate_id,
        };
        Ok(self.coll::<Contest>().find_one(filter, None).await?)
    }

    async fn contests(&self, election_id: ElectionId) -> StoreResult<Vec<Contest>> {
        let contests = self
            .coll::<Contest>()
            .find(doc! { "election_id": election_id }, None)
            .await?
            .try_collect()
            .await?;
        Ok(contests)
    }

    async fn insert_contest(&self, contest: NewContest) -> StoreResult<Contest> {
        let contest = Contest {
            id: self.next_id(CONTESTS).await?,
            contest,
        };
        self.coll::<Contest>().insert_one(&contest, None).await?;
        Ok(contest)
    }

    async fn delete_contests_for(&self, candidate_id: CandidateId) -> StoreResult<u64> {
        let result = self
            .coll::<Contest>()
            .delete_many(doc! { "candidate_id": candidate_id }, None)
            .await?;
        Ok(result.deleted_count)
    }

    async fn voter(&self, id: VoterId) -> StoreResult<Option<Voter>> {
        Ok(self
            .coll::<Voter>()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn voter_by_email(&self, email: &str) -> StoreResult<Option<Voter>> {
        Ok(self
            .coll::<Voter>()
            .find_one(doc! { "email": email }, None)
            .await?)
    }

    async fn insert_voter(&self, voter: NewVoter) -> StoreResult<Voter> {
        let voter = Voter {
            id: self.next_id(VOTERS).await?,
            voter,
        };
        self.coll::<Voter>().insert_one(&voter, None).await?;
        Ok(voter)
    }

    async fn set_last_vote(&self, id: VoterId, at: DateTime<Utc>) -> StoreResult<()> {
        let update = doc! { "$set": { "last_vote_at": serialise(&Some(at))? } };
        self.coll::<Voter>()
            .update_one(doc! { "_id": id }, update, None)
            .await?;
        Ok(())
    }

    async fn voters(&self, skip: u64, limit: u32) -> StoreResult<(Vec<Voter>, u64)> {
        let voters = self.coll::<Voter>();
        let options = FindOptions::builder()
            .sort(doc! { "registered_at": -1, "_id": -1 })
            .skip(skip)
            .limit(i64::from(limit))
            .build();
        let page = voters.find(None, options).await?.try_collect().await?;
        let total = voters.count_documents(None, None).await?;
        Ok((page, total))
    }

    async fn set_voter_verified(&self, id: VoterId) -> StoreResult<bool> {
        let result = self
            .coll::<Voter>()
            .update_one(
                doc! { "_id": id },
                doc! { "$set": { "is_verified": true } },
                None,
            )
            .await?;
        Ok(result.matched_count == 1)
    }

    async fn vote(&self, id: VoteId) -> StoreResult<Option<Vote>> {
        Ok(self
            .coll::<Vote>()
            .find_one(doc! { "_id": id }, None)
            .await?)
    }

    async fn vote_by(
        &self,
        voter_id: VoterId,
        election_id: ElectionId,
    ) -> StoreResult<Option<Vote>> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        Ok(self.coll::<Vote>().find_one(filter, None).await?)
    }

    async fn votes(&self, election_id: ElectionId) -> StoreResult<Vec<Vote>> {
        let votes = self
            .coll::<Vote>()
            .find(doc! { "election_id": election_id }, None)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn votes_by_voter(&self, voter_id: VoterId) -> StoreResult<Vec<Vote>> {
        let options = FindOptions::builder()
            .sort(doc! { "cast_at": -1, "_id": -1 })
            .build();
        let votes = self
            .coll::<Vote>()
            .find(doc! { "voter_id": voter_id }, options)
            .await?
            .try_collect()
            .await?;
        Ok(votes)
    }

    async fn insert_vote(&self, vote: NewVote) -> StoreResult<Vote> {
        let vote = Vote {
            id: self.next_id(VOTES).await?,
            vote,
        };
        // A duplicate key here is the authoritative "already voted".
        self.coll::<Vote>().insert_one(&vote, None).await?;
        Ok(vote)
    }

    async fn insert_audit_entry(&self, entry: NewAuditEntry) -> StoreResult<AuditEntry> {
        let entry = AuditEntry {
            id: self.next_id(AUDIT_LOG).await?,
            entry,
        };
        self.coll::<AuditEntry>().insert_one(&entry, None).await?;
        Ok(entry)
    }

    async fn audit_log(&self, skip: u64, limit: u32) -> StoreResult<(Vec<AuditEntry>, u64)> {
        let audit = self.coll::<AuditEntry>();
        let options = FindOptions::builder()
            .sort(doc! { "_id": -1 })
            .skip(skip)
            .limit(i64::from(limit))
            .build();
        let page = audit.find(None, options).await?.try_collect().await?;
        let total = audit.count_documents(None, None).await?;
        Ok((page, total))
    }
}
