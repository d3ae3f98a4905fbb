//! Types shared between the DB and API representations.

pub mod candidate;
pub mod election;
