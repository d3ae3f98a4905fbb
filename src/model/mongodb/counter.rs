use log::debug;
use mongodb::{
    bson::doc,
    error::Error as DbError,
    options::{FindOneAndUpdateOptions, ReturnDocument, UpdateOptions},
};
use serde::{Deserialize, Serialize};

use crate::model::store::{StoreError, StoreResult};

use super::collection::{
    Coll, AUDIT_LOG, CANDIDATES, CONTESTS, ELECTIONS, VOTERS, VOTES,
};

/// A counter object used to implement auto-increment IDs, one per collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Counter {
    #[serde(rename = "_id")]
    pub id: String,
    pub next: u32,
}

/// Every collection with integer IDs has a counter named after it.
pub const COUNTER_IDS: [&str; 6] = [ELECTIONS, CANDIDATES, CONTESTS, VOTERS, VOTES, AUDIT_LOG];

impl Counter {
    /// Atomically retrieve the next value of the counter with the given ID.
    pub async fn next(counters: &Coll<Counter>, id: &str) -> StoreResult<u32> {
        let update = doc! {
            "$inc": { "next": 1 }
        };
        let options: FindOneAndUpdateOptions = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::Before)
            .build();
        let counter = counters
            .find_one_and_update(doc! { "_id": id }, update, options)
            .await?
            .ok_or_else(|| StoreError::Backend(format!("Failed to find counter with ID {id}")))?;
        Ok(counter.next)
    }
}

/// Ensure every ID counter exists, starting at 1. Existing counters are left alone.
///
/// This operation is idempotent.
pub async fn ensure_counters_exist(counters: &Coll<Counter>) -> Result<(), DbError> {
    debug!("Ensuring ID counters exist");
    let upsert = UpdateOptions::builder().upsert(true).build();
    for id in COUNTER_IDS {
        counters
            .update_one(
                doc! { "_id": id },
                doc! { "$setOnInsert": { "next": 1 } },
                upsert.clone(),
            )
            .await?;
    }
    Ok(())
}
