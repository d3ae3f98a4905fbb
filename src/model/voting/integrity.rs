use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::election::{voting_phase, VoteId},
    db::Election,
    store::StoreHandle,
};

/// The result of checking a recorded vote against the rest of the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub vote_id: VoteId,
    pub election_exists: bool,
    /// The election accepted votes at the moment this one was cast.
    ///
    /// Judged by the election's dates at that moment together with its current `is_active`
    /// flag and voting override, since neither keeps a history.
    pub cast_while_votable: bool,
    pub candidate_in_contest: bool,
    pub voter_registered: bool,
    /// The vote is not timestamped in the future.
    pub timestamp_valid: bool,
    pub is_valid: bool,
}

/// Check that vote `vote_id` is consistent with its election, candidate and voter.
pub async fn verify_vote(
    db: &StoreHandle,
    vote_id: VoteId,
    now: DateTime<Utc>,
) -> Result<IntegrityReport> {
    let vote = db
        .run(db.vote(vote_id))
        .await?
        .ok_or_else(|| Error::not_found(format!("Vote {vote_id}")))?;

    let election: Option<Election> = db.run(db.election(vote.election_id)).await?.map(Into::into);
    let cast_while_votable = election
        .as_ref()
        .and_then(|e| voting_phase(e, vote.cast_at).ok())
        .map_or(false, |phase| phase.accepts_votes());
    let candidate_in_contest = db
        .run(db.contest(vote.election_id, vote.candidate_id))
        .await?
        .map_or(false, |contest| contest.id == vote.contest_id);
    let voter_registered = db.run(db.voter(vote.voter_id)).await?.is_some();
    let timestamp_valid = vote.cast_at <= now;

    let election_exists = election.is_some();
    Ok(IntegrityReport {
        vote_id,
        election_exists,
        cast_while_votable,
        candidate_in_contest,
        voter_registered,
        timestamp_valid,
        is_valid: election_exists
            && cast_while_votable
            && candidate_in_contest
            && voter_registered
            && timestamp_valid,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::TimeZone;
    use rocket::http::Status;

    use crate::model::{
        db::{CandidateCore, ContestCore, ElectionCore, NewVote, NewVoter},
        store::memory::MemoryStore,
    };

    use super::*;

    fn at(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, d, 12, 0, 0).unwrap()
    }

    async fn seed(db: &StoreHandle, cast_at: DateTime<Utc>) -> (VoteId, u32) {
        let election = db
            .insert_election(ElectionCore::scheduled_example())
            .await
            .unwrap();
        let candidate = db
            .insert_candidate(CandidateCore::example(election.id))
            .await
            .unwrap();
        let contest = db
            .insert_contest(ContestCore::example(election.id, candidate.id))
            .await
            .unwrap();
        let voter = db.insert_voter(NewVoter::example()).await.unwrap();
        let vote = db
            .insert_vote(NewVote {
                voter_id: voter.id,
                election_id: election.id,
                contest_id: contest.id,
                candidate_id: candidate.id,
                cast_at,
            })
            .await
            .unwrap();
        (vote.id, candidate.id)
    }

    fn handle() -> StoreHandle {
        StoreHandle::new(Arc::new(MemoryStore::default()), Duration::from_secs(10))
    }

    #[rocket::async_test]
    async fn consistent_vote_is_valid() {
        let db = handle();
        let (vote_id, _) = seed(&db, at(12)).await;
        let report = verify_vote(&db, vote_id, at(20)).await.unwrap();
        assert!(report.is_valid, "{report:?}");
    }

    #[rocket::async_test]
    async fn out_of_window_and_future_votes_are_flagged() {
        let db = handle();
        let (vote_id, _) = seed(&db, at(16)).await;
        let report = verify_vote(&db, vote_id, at(14)).await.unwrap();
        assert!(report.election_exists);
        assert!(!report.cast_while_votable);
        assert!(!report.timestamp_valid);
        assert!(report.candidate_in_contest);
        assert!(report.voter_registered);
        assert!(!report.is_valid);
    }

    #[rocket::async_test]
    async fn flags_are_judged_as_they_are_now() {
        let db = handle();
        // Cast the day before the window opened, while the election was held active.
        let (vote_id, _) = seed(&db, at(9)).await;
        let election_id = db.vote(vote_id).await.unwrap().unwrap().election_id;

        db.set_election_active(election_id, true).await.unwrap();
        let report = verify_vote(&db, vote_id, at(20)).await.unwrap();
        assert!(report.cast_while_votable);

        db.set_election_active(election_id, false).await.unwrap();
        let report = verify_vote(&db, vote_id, at(20)).await.unwrap();
        assert!(!report.cast_while_votable);
        assert!(!report.is_valid);
    }

    #[rocket::async_test]
    async fn removed_contest_is_flagged() {
        let db = handle();
        let (vote_id, candidate_id) = seed(&db, at(12)).await;
        db.delete_contests_for(candidate_id).await.unwrap();
        let report = verify_vote(&db, vote_id, at(20)).await.unwrap();
        assert!(!report.candidate_in_contest);
        assert!(!report.is_valid);
    }

    #[rocket::async_test]
    async fn unknown_vote_is_not_found() {
        let db = handle();
        let err = verify_vote(&db, 42, at(20)).await.unwrap_err();
        assert_eq!(err.status(), Status::NotFound);
    }
}
