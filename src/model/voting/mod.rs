//! Vote casting and the checks made on recorded votes.

mod caster;
mod integrity;

pub use caster::VoteCaster;
pub use integrity::{verify_vote, IntegrityReport};
