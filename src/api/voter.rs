use chrono::Utc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        candidate::{CandidacyApplication, CandidateDescription},
        vote::{CastRequest, VoteHistoryEntry, VoteReceipt, VoteStatus},
        voter::{VoterDescription, VoterRegistration},
    },
    auth::AuthToken,
    common::election::{resolve_phase, ElectionId},
    db::{NewVoter, Voter},
    store::StoreHandle,
    voting::VoteCaster,
};

use super::common::load_election;

pub fn routes() -> Vec<Route> {
    routes![
        register,
        apply_for_candidacy,
        vote_status,
        cast_vote,
        vote_history
    ]
}

/// Look up the voter registered to the token's identity.
async fn registered_voter(token: &AuthToken<Voter>, db: &StoreHandle) -> Result<Voter> {
    db.run(db.voter_by_email(token.identity()))
        .await?
        .ok_or_else(|| Error::VoterNotRegistered(token.identity().to_string()))
}

#[post("/voter/register", data = "<registration>", format = "json")]
async fn register(
    token: AuthToken<Voter>,
    registration: Json<VoterRegistration>,
    db: &State<StoreHandle>,
) -> Result<Json<VoterDescription>> {
    let full_name = registration.0.full_name.trim();
    if full_name.is_empty() {
        return Err(Error::bad_request("Full name must not be empty"));
    }
    let voter = NewVoter::new(token.identity().to_string(), full_name.to_string());
    // The store rejects a second registration for the same identity.
    let voter = db.run(db.insert_voter(voter)).await?;
    Ok(Json(voter.into()))
}

#[post(
    "/voter/elections/<election_id>/candidacy",
    data = "<application>",
    format = "json"
)]
async fn apply_for_candidacy(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    application: Json<CandidacyApplication>,
    db: &State<StoreHandle>,
) -> Result<Json<CandidateDescription>> {
    let election = load_election(db, election_id).await?;
    if !resolve_phase(&election, Utc::now())?.accepts_candidacy() {
        return Err(Error::Status(
            Status::Conflict,
            "Candidacy applications for this election are closed.".to_string(),
        ));
    }
    let voter = registered_voter(&token, db).await?;

    let existing = db.run(db.candidates(election_id)).await?;
    if existing
        .iter()
        .any(|c| c.applicant.as_deref() == Some(token.identity()))
    {
        return Err(Error::Status(
            Status::Conflict,
            "You have already applied to stand in this election.".to_string(),
        ));
    }

    let candidate =
        application
            .0
            .into_new_candidate(election_id, token.identity(), &voter.full_name);
    let candidate = db.run(db.insert_candidate(candidate)).await?;
    Ok(Json(CandidateDescription::new(candidate, &[])))
}

/// Whether the voter has already voted. Advisory: the cast itself is the authority.
#[get("/voter/elections/<election_id>/vote")]
async fn vote_status(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    db: &State<StoreHandle>,
) -> Result<Json<VoteStatus>> {
    let voter = registered_voter(&token, db).await?;
    let vote = db.run(db.vote_by(voter.id, election_id)).await?;
    Ok(Json(VoteStatus {
        election_id,
        has_voted: vote.is_some(),
        receipt: vote.map(VoteReceipt::from),
    }))
}

#[post("/voter/elections/<election_id>/vote", data = "<choice>", format = "json")]
async fn cast_vote(
    token: AuthToken<Voter>,
    election_id: ElectionId,
    choice: Json<CastRequest>,
    db: &State<StoreHandle>,
) -> Result<Json<VoteReceipt>> {
    let vote = VoteCaster::new(db)
        .cast_vote(
            token.identity(),
            election_id,
            choice.candidate_id,
            Utc::now(),
        )
        .await?;
    Ok(Json(vote.into()))
}

/// Every vote the signed-in voter has cast, most recent first.
#[get("/voter/history")]
async fn vote_history(
    token: AuthToken<Voter>,
    db: &State<StoreHandle>,
) -> Result<Json<Vec<VoteHistoryEntry>>> {
    let voter = registered_voter(&token, db).await?;
    let votes = db.run(db.votes_by_voter(voter.id)).await?;

    let mut history = Vec::with_capacity(votes.len());
    for vote in votes {
        // Votes pin their election and candidate, so a gap means an out-of-band delete.
        let Some(election) = db.run(db.election(vote.election_id)).await? else {
            continue;
        };
        let Some(candidate) = db.run(db.candidate(vote.candidate_id)).await? else {
            continue;
        };
        let contest = db
            .run(db.contest(vote.election_id, vote.candidate_id))
            .await?;
        history.push(VoteHistoryEntry::new(vote, election, candidate, contest));
    }
    Ok(Json(history))
}
