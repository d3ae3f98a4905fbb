mod phase;
mod schedule;

pub use phase::{resolve_phase, voting_phase, Phase};
pub use schedule::{parse_date, parse_instant, Schedule, ScheduleError, PRE_VOTING_DAYS};

/// Our election IDs are integers.
pub type ElectionId = u32;
/// Our candidate IDs are integers.
pub type CandidateId = u32;
/// Our contest IDs are integers.
pub type ContestId = u32;
/// Our voter IDs are integers.
pub type VoterId = u32;
/// Our vote IDs are integers.
pub type VoteId = u32;
