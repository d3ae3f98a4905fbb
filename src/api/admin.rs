use chrono::Utc;
use log::warn;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        admin::{ActiveFlag, AuditDescription, OverrideRequest},
        candidate::{ApprovalRequest, CandidateDescription, CandidateSpec},
        election::{ElectionSpec, ElectionSummary},
        pagination::{Paginated, Pagination},
        voter::VoterDescription,
    },
    auth::{Admin, AuthToken},
    common::{
        candidate::CandidateStatus,
        election::{CandidateId, ElectionId, VoteId, VoterId},
    },
    db::{AuditAction, Candidate, Election, NewContest, VotingOverride},
    store::StoreHandle,
    voting::{verify_vote, IntegrityReport},
};

use super::common::{audit, candidate_descriptions, load_election};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        delete_election,
        set_active,
        grant_override,
        revoke_override,
        election_candidates,
        create_candidate,
        approve_candidate,
        reject_candidate,
        delete_candidate,
        vote_integrity,
        list_voters,
        verify_voter,
        audit_log,
    ]
}

async fn load_candidate(db: &StoreHandle, candidate_id: CandidateId) -> Result<Candidate> {
    db.run(db.candidate(candidate_id))
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))
}

/// Refuse to remove a candidate from the running if anyone has voted for them.
async fn ensure_no_votes_for(db: &StoreHandle, candidate: &Candidate) -> Result<()> {
    let votes = db.run(db.votes(candidate.election_id)).await?;
    if votes.iter().any(|v| v.candidate_id == candidate.id) {
        return Err(Error::Status(
            Status::Conflict,
            format!("Candidate {} has already received votes", candidate.id),
        ));
    }
    Ok(())
}

#[post("/admin/elections", data = "<spec>", format = "json")]
async fn create_election(
    token: AuthToken<Admin>,
    spec: Json<ElectionSpec>,
    db: &State<StoreHandle>,
) -> Result<Json<ElectionSummary>> {
    let election = spec.0.into_new_election(token.identity())?;
    let record = db.run(db.insert_election(election)).await?;
    audit(
        db,
        token.identity(),
        AuditAction::CreateElection,
        format!("created election {} '{}'", record.id, record.name),
    )
    .await?;
    Ok(Json(ElectionSummary::at(
        &Election::from(record),
        Utc::now(),
    )))
}

#[delete("/admin/elections/<election_id>")]
async fn delete_election(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    db: &State<StoreHandle>,
) -> Result<()> {
    // Votes are never deleted, so neither is an election that has them.
    if !db.run(db.votes(election_id)).await?.is_empty() {
        return Err(Error::Status(
            Status::Conflict,
            format!("Election {election_id} has votes and cannot be deleted"),
        ));
    }
    if !db.run(db.delete_election(election_id)).await? {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    audit(
        db,
        token.identity(),
        AuditAction::DeleteElection,
        format!("deleted election {election_id}"),
    )
    .await
}

#[put("/admin/elections/<election_id>/active", data = "<flag>", format = "json")]
async fn set_active(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    flag: Json<ActiveFlag>,
    db: &State<StoreHandle>,
) -> Result<Json<ElectionSummary>> {
    if !db.run(db.set_election_active(election_id, flag.is_active)).await? {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    audit(
        db,
        token.identity(),
        AuditAction::SetElectionActive,
        format!("set election {election_id} active = {}", flag.is_active),
    )
    .await?;
    let election = load_election(db, election_id).await?;
    Ok(Json(ElectionSummary::at(&election, Utc::now())))
}

#[post(
    "/admin/elections/<election_id>/override",
    data = "<request>",
    format = "json"
)]
async fn grant_override(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    request: Json<OverrideRequest>,
    db: &State<StoreHandle>,
) -> Result<Json<ElectionSummary>> {
    let reason = request.0.reason.trim().to_string();
    if reason.is_empty() {
        return Err(Error::bad_request("A reason is required to override voting"));
    }
    let grant = VotingOverride {
        granted_by: token.identity().to_string(),
        reason,
        granted_at: Utc::now(),
    };
    let description = format!(
        "held voting open in election {election_id}: {}",
        grant.reason
    );
    if !db.run(db.set_voting_override(election_id, Some(grant))).await? {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    warn!("{} {description}", token.identity());
    audit(
        db,
        token.identity(),
        AuditAction::GrantVotingOverride,
        description,
    )
    .await?;
    let election = load_election(db, election_id).await?;
    Ok(Json(ElectionSummary::at(&election, Utc::now())))
}

#[delete("/admin/elections/<election_id>/override")]
async fn revoke_override(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    db: &State<StoreHandle>,
) -> Result<Json<ElectionSummary>> {
    if !db.run(db.set_voting_override(election_id, None)).await? {
        return Err(Error::not_found(format!("Election {election_id}")));
    }
    audit(
        db,
        token.identity(),
        AuditAction::RevokeVotingOverride,
        format!("revoked voting override in election {election_id}"),
    )
    .await?;
    let election = load_election(db, election_id).await?;
    Ok(Json(ElectionSummary::at(&election, Utc::now())))
}

#[get("/admin/elections/<election_id>/candidates")]
async fn election_candidates(
    _token: AuthToken<Admin>,
    election_id: ElectionId,
    db: &State<StoreHandle>,
) -> Result<Json<Vec<CandidateDescription>>> {
    load_election(db, election_id).await?;
    Ok(Json(candidate_descriptions(db, election_id, false).await?))
}

#[post(
    "/admin/elections/<election_id>/candidates",
    data = "<spec>",
    format = "json"
)]
async fn create_candidate(
    token: AuthToken<Admin>,
    election_id: ElectionId,
    spec: Json<CandidateSpec>,
    db: &State<StoreHandle>,
) -> Result<Json<CandidateDescription>> {
    load_election(db, election_id).await?;
    let (candidate, position) = spec.0.into_new_candidate(election_id)?;
    let candidate = db.run(db.insert_candidate(candidate)).await?;
    let contest = db
        .run(db.insert_contest(NewContest {
            election_id,
            candidate_id: candidate.id,
            position,
        }))
        .await?;
    audit(
        db,
        token.identity(),
        AuditAction::CreateCandidate,
        format!(
            "created candidate {} '{}' in election {election_id}",
            candidate.id, candidate.full_name
        ),
    )
    .await?;
    Ok(Json(CandidateDescription::new(candidate, &[contest])))
}

#[post(
    "/admin/candidates/<candidate_id>/approve",
    data = "<request>",
    format = "json"
)]
async fn approve_candidate(
    token: AuthToken<Admin>,
    candidate_id: CandidateId,
    request: Json<ApprovalRequest>,
    db: &State<StoreHandle>,
) -> Result<Json<CandidateDescription>> {
    let position = request.0.position.trim().to_string();
    if position.is_empty() {
        return Err(Error::bad_request("Contested position must not be empty"));
    }
    let mut candidate = load_candidate(db, candidate_id).await?;
    let election_id = candidate.election_id;

    // A candidate is only votable with both, so a failure part way leaves them unvotable.
    db.run(db.set_candidate_status(candidate_id, CandidateStatus::Approved))
        .await?;
    candidate.status = CandidateStatus::Approved;
    let contest = match db.run(db.contest(election_id, candidate_id)).await? {
        Some(contest) => contest,
        None => {
            db.run(db.insert_contest(NewContest {
                election_id,
                candidate_id,
                position,
            }))
            .await?
        }
    };

    audit(
        db,
        token.identity(),
        AuditAction::ApproveCandidate,
        format!("approved candidate {candidate_id} in election {election_id}"),
    )
    .await?;
    Ok(Json(CandidateDescription::new(candidate, &[contest])))
}

#[post("/admin/candidates/<candidate_id>/reject")]
async fn reject_candidate(
    token: AuthToken<Admin>,
    candidate_id: CandidateId,
    db: &State<StoreHandle>,
) -> Result<Json<CandidateDescription>> {
    let mut candidate = load_candidate(db, candidate_id).await?;
    ensure_no_votes_for(db, &candidate).await?;

    db.run(db.delete_contests_for(candidate_id)).await?;
    db.run(db.set_candidate_status(candidate_id, CandidateStatus::Rejected))
        .await?;
    candidate.status = CandidateStatus::Rejected;

    audit(
        db,
        token.identity(),
        AuditAction::RejectCandidate,
        format!(
            "rejected candidate {candidate_id} in election {}",
            candidate.election_id
        ),
    )
    .await?;
    Ok(Json(CandidateDescription::new(candidate, &[])))
}

#[delete("/admin/candidates/<candidate_id>")]
async fn delete_candidate(
    token: AuthToken<Admin>,
    candidate_id: CandidateId,
    db: &State<StoreHandle>,
) -> Result<()> {
    let candidate = load_candidate(db, candidate_id).await?;
    ensure_no_votes_for(db, &candidate).await?;
    db.run(db.delete_candidate(candidate_id)).await?;
    audit(
        db,
        token.identity(),
        AuditAction::DeleteCandidate,
        format!(
            "deleted candidate {candidate_id} '{}' from election {}",
            candidate.full_name, candidate.election_id
        ),
    )
    .await
}

#[get("/admin/votes/<vote_id>/integrity")]
async fn vote_integrity(
    _token: AuthToken<Admin>,
    vote_id: VoteId,
    db: &State<StoreHandle>,
) -> Result<Json<IntegrityReport>> {
    Ok(Json(verify_vote(db, vote_id, Utc::now()).await?))
}

#[get("/admin/voters")]
async fn list_voters(
    _token: AuthToken<Admin>,
    pagination: Pagination,
    db: &State<StoreHandle>,
) -> Result<Json<Paginated<VoterDescription>>> {
    let (voters, total) = db
        .run(db.voters(pagination.skip(), pagination.page_size()))
        .await?;
    Ok(Json(Paginated {
        items: voters.into_iter().map(VoterDescription::from).collect(),
        pagination: pagination.result(total),
    }))
}

#[post("/admin/voters/<voter_id>/verify")]
async fn verify_voter(
    token: AuthToken<Admin>,
    voter_id: VoterId,
    db: &State<StoreHandle>,
) -> Result<Json<VoterDescription>> {
    if !db.run(db.set_voter_verified(voter_id)).await? {
        return Err(Error::not_found(format!("Voter {voter_id}")));
    }
    audit(
        db,
        token.identity(),
        AuditAction::VerifyVoter,
        format!("verified voter {voter_id}"),
    )
    .await?;
    let voter = db
        .run(db.voter(voter_id))
        .await?
        .ok_or_else(|| Error::not_found(format!("Voter {voter_id}")))?;
    Ok(Json(voter.into()))
}

#[get("/admin/audit")]
async fn audit_log(
    _token: AuthToken<Admin>,
    pagination: Pagination,
    db: &State<StoreHandle>,
) -> Result<Json<Paginated<AuditDescription>>> {
    let (entries, total) = db
        .run(db.audit_log(pagination.skip(), pagination.page_size()))
        .await?;
    Ok(Json(Paginated {
        items: entries.into_iter().map(AuditDescription::from).collect(),
        pagination: pagination.result(total),
    }))
}
