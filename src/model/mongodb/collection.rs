use std::ops::Deref;

use log::debug;
use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};

use crate::model::db::{AuditEntry, Candidate, Contest, ElectionRecord, Vote, Voter};

use super::counter::Counter;

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

macro_rules! collection {
    ($name:expr => $t:ty) => {
        impl MongoCollection for $t {
            const NAME: &'static str = $name;
        }
    };
}

pub const ELECTIONS: &str = "elections";
pub const CANDIDATES: &str = "candidates";
pub const CONTESTS: &str = "contests";
pub const VOTERS: &str = "voters";
pub const VOTES: &str = "votes";
pub const AUDIT_LOG: &str = "audit_log";
pub const COUNTERS: &str = "counters";

collection!(ELECTIONS => ElectionRecord);
collection!(CANDIDATES => Candidate);
collection!(CONTESTS => Contest);
collection!(VOTERS => Voter);
collection!(VOTES => Vote);
collection!(AUDIT_LOG => AuditEntry);
collection!(COUNTERS => Counter);

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes are what actually enforce one vote per voter per election;
/// everything the application checks beforehand is advisory.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Voter collection.
    let voter_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<Voter>::from_db(db)
        .create_index(voter_index, None)
        .await?;

    // Contest collection.
    let contest_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "candidate_id": 1})
        .options(unique.clone())
        .build();
    Coll::<Contest>::from_db(db)
        .create_index(contest_index, None)
        .await?;

    // Vote collection.
    let vote_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1})
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(vote_index, None)
        .await?;

    // Candidate collection, for per-election listing.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    Ok(())
}
