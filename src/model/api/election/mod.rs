mod desc;
mod results;
mod spec;

pub use desc::{ElectionDescription, ElectionSummary};
pub use results::{CandidateResult, ElectionResults};
pub use spec::{ElectionSpec, ScheduleSpec};
