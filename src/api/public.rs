use chrono::Utc;
use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::model::{
    api::election::{ElectionDescription, ElectionResults, ElectionSummary},
    auth::{Admin, AuthToken},
    common::election::{resolve_phase, ElectionId, Phase},
    db::Election,
    store::StoreHandle,
};

use super::common::{candidate_descriptions, load_election};

pub fn routes() -> Vec<Route> {
    routes![elections, election, election_results]
}

#[get("/elections")]
async fn elections(db: &State<StoreHandle>) -> Result<Json<Vec<ElectionSummary>>> {
    let now = Utc::now();
    let elections = db
        .run(db.elections())
        .await?
        .into_iter()
        .map(|record| ElectionSummary::at(&Election::from(record), now))
        .collect();
    Ok(Json(elections))
}

#[get("/elections/<election_id>")]
async fn election(
    election_id: ElectionId,
    db: &State<StoreHandle>,
) -> Result<Json<ElectionDescription>> {
    let election = load_election(db, election_id).await?;
    let candidates = candidate_descriptions(db, election_id, true).await?;
    Ok(Json(ElectionDescription::at(
        &election,
        candidates,
        Utc::now(),
    )))
}

/// Results are public once the election's dates have passed, even if voting is held open by
/// an override; admins may watch them at any time.
#[get("/elections/<election_id>/results")]
async fn election_results(
    election_id: ElectionId,
    token: Option<AuthToken<Admin>>,
    db: &State<StoreHandle>,
) -> Result<Json<ElectionResults>> {
    let election = load_election(db, election_id).await?;
    let phase = resolve_phase(&election, Utc::now()).ok();
    if token.is_none() && phase != Some(Phase::Ended) {
        return Err(Error::Status(
            Status::Forbidden,
            "Results are published once voting has closed.".to_string(),
        ));
    }

    let candidates = db.run(db.candidates(election_id)).await?;
    let votes = db.run(db.votes(election_id)).await?;
    Ok(Json(ElectionResults::tally(
        election_id,
        phase,
        &candidates,
        &votes,
    )))
}
