//! DB-compatible (e.g. de/serialisable) types.
//!
//! Every stored type comes in two flavours: a `...Core` holding the data, which is
//! what gets inserted, and a wrapper adding the store-assigned `_id`, which is what
//! gets read back.

mod audit;
pub use audit::{AuditAction, AuditEntry, NewAuditEntry};

mod candidate;
pub use candidate::{Candidate, CandidateCore, NewCandidate};

mod contest;
pub use contest::{Contest, ContestCore, NewContest};

mod election;
pub use election::{
    Election, ElectionCore, ElectionRecord, NewElection, ScheduleWindow, VotingOverride,
};

mod vote;
pub use vote::{NewVote, Vote, VoteCore};

mod voter;
pub use voter::{NewVoter, Voter, VoterCore};
