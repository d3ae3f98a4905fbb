use log::info;

use crate::error::{Error, Result};
use crate::model::{
    api::candidate::CandidateDescription,
    common::{candidate::CandidateStatus, election::ElectionId},
    db::{AuditAction, Election, NewAuditEntry},
    store::StoreHandle,
};

/// Load an election, or 404.
pub async fn load_election(db: &StoreHandle, election_id: ElectionId) -> Result<Election> {
    db.run(db.election(election_id))
        .await?
        .map(Election::from)
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// Describe the candidates standing in an election, optionally including those not approved.
pub async fn candidate_descriptions(
    db: &StoreHandle,
    election_id: ElectionId,
    approved_only: bool,
) -> Result<Vec<CandidateDescription>> {
    let candidates = db.run(db.candidates(election_id)).await?;
    let contests = db.run(db.contests(election_id)).await?;
    Ok(candidates
        .into_iter()
        .filter(|c| !approved_only || c.status == CandidateStatus::Approved)
        .map(|c| CandidateDescription::new(c, &contests))
        .collect())
}

/// Record an admin action in the audit log.
pub async fn audit(
    db: &StoreHandle,
    actor: &str,
    action: AuditAction,
    description: String,
) -> Result<()> {
    info!("Audit: {actor} {description}");
    db.run(db.insert_audit_entry(NewAuditEntry::now(actor, action, description)))
        .await?;
    Ok(())
}
