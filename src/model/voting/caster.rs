use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::{Error, Result};
use crate::model::{
    common::{
        candidate::CandidateStatus,
        election::{voting_phase, CandidateId, ElectionId},
    },
    db::{Election, NewVote, Vote},
    store::{StoreError, StoreHandle},
};

/// Records votes, allowing at most one per voter per election.
///
/// Each precondition is checked against the store in turn; the store's unique index on
/// (voter, election) is the final word on duplicates.
pub struct VoteCaster<'a> {
    db: &'a StoreHandle,
}

impl<'a> VoteCaster<'a> {
    pub fn new(db: &'a StoreHandle) -> Self {
        Self { db }
    }

    /// Cast a vote by the voter signed in as `identity` for `candidate_id` in `election_id`.
    pub async fn cast_vote(
        &self,
        identity: &str,
        election_id: ElectionId,
        candidate_id: CandidateId,
        now: DateTime<Utc>,
    ) -> Result<Vote> {
        let db = self.db;

        // The election must exist and be open.
        let election: Election = db
            .run(db.election(election_id))
            .await?
            .ok_or(Error::ElectionNotVotable {
                election_id,
                phase: None,
            })?
            .into();
        let phase = voting_phase(&election, now)?;
        if !phase.accepts_votes() {
            return Err(Error::ElectionNotVotable {
                election_id,
                phase: Some(phase),
            });
        }

        // The candidate must be approved and standing in it.
        let not_standing = Error::CandidateNotInContest {
            election_id,
            candidate_id,
        };
        let approved = db
            .run(db.candidate(candidate_id))
            .await?
            .map_or(false, |c| {
                c.election_id == election_id && c.status == CandidateStatus::Approved
            });
        if !approved {
            return Err(not_standing);
        }
        let contest = db
            .run(db.contest(election_id, candidate_id))
            .await?
            .ok_or(not_standing)?;

        // The identity must belong to a registered voter.
        let voter = db
            .run(db.voter_by_email(identity))
            .await?
            .ok_or_else(|| Error::VoterNotRegistered(identity.to_string()))?;

        // Fast path for repeats; not authoritative.
        if db.run(db.vote_by(voter.id, election_id)).await?.is_some() {
            return Err(Error::DuplicateVote(election_id));
        }

        let new_vote = NewVote {
            voter_id: voter.id,
            election_id,
            contest_id: contest.id,
            candidate_id,
            cast_at: now,
        };
        let vote = match db.run(db.insert_vote(new_vote)).await {
            Ok(vote) => vote,
            Err(StoreError::Conflict(what)) => {
                info!("Store refused duplicate {what}");
                return Err(Error::DuplicateVote(election_id));
            }
            Err(e) => return Err(Error::StoreUnavailable(e)),
        };

        if let Err(e) = db.run(db.set_last_vote(voter.id, now)).await {
            warn!("Vote {} recorded but voter {} not updated: {e}", vote.id, voter.id);
        }
        Ok(vote)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::TimeZone;
    use rocket::tokio::join;

    use crate::model::{
        common::election::{ContestId, Phase},
        db::{CandidateCore, ContestCore, ElectionCore, NewVoter},
        store::memory::MemoryStore,
    };

    use super::*;

    struct Fixture {
        store: MemoryStore,
        db: StoreHandle,
        election_id: ElectionId,
        candidate_id: CandidateId,
        contest_id: ContestId,
    }

    /// An election open from 2025-10-10T08:00 to 2025-10-15T18:00 with one contesting
    /// candidate and one registered voter.
    async fn fixture() -> Fixture {
        let store = MemoryStore::default();
        let db = StoreHandle::new(Arc::new(store.clone()), Duration::from_secs(10));
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
        db.insert_voter(NewVoter::example()).await.unwrap();
        Fixture {
            store,
            db,
            election_id: election.id,
            candidate_id: candidate.id,
            contest_id: contest.id,
        }
    }

    fn during() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 12, 0, 0, 0).unwrap()
    }

    fn after() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 16, 0, 0, 0).unwrap()
    }

    #[rocket::async_test]
    async fn successful_cast_records_one_vote() {
        let f = fixture().await;
        let vote = VoteCaster::new(&f.db)
            .cast_vote(
                NewVoter::EXAMPLE_EMAIL,
                f.election_id,
                f.candidate_id,
                during(),
            )
            .await
            .unwrap();
        assert_eq!(vote.election_id, f.election_id);
        assert_eq!(vote.candidate_id, f.candidate_id);
        assert_eq!(vote.contest_id, f.contest_id);
        assert_eq!(vote.cast_at, during());
        assert_eq!(f.store.vote_count(), 1);

        let voter = f
            .db
            .voter_by_email(NewVoter::EXAMPLE_EMAIL)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(voter.last_vote_at, Some(during()));
    }

    #[rocket::async_test]
    async fn immediate_retry_is_a_duplicate() {
        let f = fixture().await;
        let caster = VoteCaster::new(&f.db);
        caster
            .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, during())
            .await
            .unwrap();
        let retry = caster
            .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, during())
            .await;
        assert!(matches!(retry, Err(Error::DuplicateVote(id)) if id == f.election_id));
        assert_eq!(f.store.vote_count(), 1);
    }

    #[rocket::async_test]
    async fn ended_election_is_not_votable() {
        let f = fixture().await;
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, after())
            .await;
        assert!(matches!(
            result,
            Err(Error::ElectionNotVotable {
                phase: Some(Phase::Ended),
                ..
            })
        ));
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn active_flag_does_not_reopen_ended_election() {
        let f = fixture().await;
        f.db.set_election_active(f.election_id, true).await.unwrap();
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, after())
            .await;
        assert!(matches!(result, Err(Error::ElectionNotVotable { .. })));
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn missing_election_is_not_votable() {
        let f = fixture().await;
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, 999, f.candidate_id, during())
            .await;
        assert!(matches!(
            result,
            Err(Error::ElectionNotVotable {
                election_id: 999,
                phase: None
            })
        ));
    }

    #[rocket::async_test]
    async fn unusable_schedule_refuses_votes() {
        let f = fixture().await;
        let mut core = ElectionCore::dated_example();
        core.election_date = Some("2025-13-45".to_string());
        core.is_active = true;
        let broken = f.db.insert_election(core).await.unwrap();
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, broken.id, f.candidate_id, during())
            .await;
        assert!(matches!(result, Err(Error::InvalidElectionSchedule(id, _)) if id == broken.id));
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn candidate_without_contest_is_refused() {
        let f = fixture().await;
        let pending = f
            .db
            .insert_candidate(CandidateCore::example2(f.election_id))
            .await
            .unwrap();
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, pending.id, during())
            .await;
        assert!(matches!(
            result,
            Err(Error::CandidateNotInContest { candidate_id, .. }) if candidate_id == pending.id
        ));
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn unapproved_candidate_with_contest_is_refused() {
        let f = fixture().await;
        for status in [CandidateStatus::Rejected, CandidateStatus::Pending] {
            f.db.set_candidate_status(f.candidate_id, status).await.unwrap();
            let result = VoteCaster::new(&f.db)
                .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, during())
                .await;
            assert!(
                matches!(result, Err(Error::CandidateNotInContest { .. })),
                "{status}: {result:?}"
            );
        }
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn candidate_from_another_election_is_refused() {
        let f = fixture().await;
        let other = f
            .db
            .insert_election(ElectionCore::scheduled_example())
            .await
            .unwrap();
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, other.id, f.candidate_id, during())
            .await;
        assert!(matches!(result, Err(Error::CandidateNotInContest { .. })));
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn unregistered_identity_is_refused() {
        let f = fixture().await;
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE2_EMAIL, f.election_id, f.candidate_id, during())
            .await;
        assert!(matches!(result, Err(Error::VoterNotRegistered(email)) if email == NewVoter::EXAMPLE2_EMAIL));
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn unavailable_store_is_reported() {
        let f = fixture().await;
        f.store.set_unavailable(true);
        let result = VoteCaster::new(&f.db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, during())
            .await;
        let err = result.unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable(StoreError::Backend(_))));
        assert!(err.retryable());

        f.store.set_unavailable(false);
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn slow_store_times_out() {
        let f = fixture().await;
        let db = StoreHandle::new(Arc::new(f.store.clone()), Duration::from_millis(20));
        f.store.set_latency(Some(Duration::from_millis(200)));
        let result = VoteCaster::new(&db)
            .cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, during())
            .await;
        assert!(matches!(
            result,
            Err(Error::StoreUnavailable(StoreError::Timeout(_)))
        ));
        f.store.set_latency(None);
        assert_eq!(f.store.vote_count(), 0);
    }

    #[rocket::async_test]
    async fn racing_casts_commit_at_most_one_vote() {
        let f = fixture().await;
        // Both requests miss each other on the advisory check.
        f.store.set_stale_vote_reads(true);
        f.store.set_latency(Some(Duration::from_millis(5)));
        let caster = VoteCaster::new(&f.db);
        let (first, second) = join!(
            caster.cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, during()),
            caster.cast_vote(NewVoter::EXAMPLE_EMAIL, f.election_id, f.candidate_id, during()),
        );
        f.store.set_latency(None);

        let outcomes = [first, second];
        let successes = outcomes.iter().filter(|r| r.is_ok()).count();
        let duplicates = outcomes
            .iter()
            .filter(|r| matches!(r, Err(Error::DuplicateVote(_))))
            .count();
        assert_eq!(successes, 1);
        assert_eq!(duplicates, 1);
        assert_eq!(f.store.vote_count(), 1);
    }
}
