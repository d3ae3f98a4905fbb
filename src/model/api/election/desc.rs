use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::candidate::CandidateDescription,
    common::election::{resolve_phase, voting_phase, ElectionId, Phase},
    db::{Election, VotingOverride},
};

/// A summary of an election and where it is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionSummary {
    /// Election unique ID.
    pub id: ElectionId,
    /// Election name.
    pub name: String,
    pub election_type: String,
    pub description: Option<String>,
    pub election_date: Option<String>,
    pub is_active: bool,
    /// Phase by the election's dates. `None` if they are unusable.
    pub phase: Option<Phase>,
    pub accepts_candidacy: bool,
    pub accepts_votes: bool,
    pub voting_opens: Option<DateTime<Utc>>,
    pub voting_closes: Option<DateTime<Utc>>,
    /// Why the election's dates are unusable, if they are.
    pub schedule_error: Option<String>,
}

impl ElectionSummary {
    /// Summarise `election` as of `now`.
    pub fn at(election: &Election, now: DateTime<Utc>) -> Self {
        let phase = resolve_phase(election, now).ok();
        let accepts_votes = voting_phase(election, now).map_or(false, Phase::accepts_votes);
        let (voting_opens, voting_closes, schedule_error) = match election.schedule() {
            Ok(schedule) => (
                Some(schedule.voting_opens()),
                Some(schedule.voting_closes()),
                None,
            ),
            Err(e) => (None, None, Some(e.to_string())),
        };
        Self {
            id: election.id,
            name: election.name.clone(),
            election_type: election.election_type.clone(),
            description: election.description.clone(),
            election_date: election.election_date.clone(),
            is_active: election.is_active,
            phase,
            accepts_candidacy: phase.map_or(false, Phase::accepts_candidacy),
            accepts_votes,
            voting_opens,
            voting_closes,
            schedule_error,
        }
    }
}

/// An election together with its candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectionDescription {
    #[serde(flatten)]
    pub summary: ElectionSummary,
    pub voting_override: Option<VotingOverride>,
    pub candidates: Vec<CandidateDescription>,
}

impl ElectionDescription {
    pub fn at(
        election: &Election,
        candidates: Vec<CandidateDescription>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            summary: ElectionSummary::at(election, now),
            voting_override: election.voting_override.clone(),
            candidates,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::model::db::{ElectionCore, ElectionRecord};

    use super::*;

    #[test]
    fn summary_of_open_election() {
        let election: Election = ElectionRecord {
            id: 4,
            election: ElectionCore::scheduled_example(),
        }
        .into();
        let now = Utc.with_ymd_and_hms(2025, 10, 12, 0, 0, 0).unwrap();
        let summary = ElectionSummary::at(&election, now);
        assert_eq!(summary.phase, Some(Phase::Active));
        assert!(summary.accepts_votes);
        assert!(!summary.accepts_candidacy);
        assert_eq!(
            summary.voting_opens,
            Some(Utc.with_ymd_and_hms(2025, 10, 10, 8, 0, 0).unwrap())
        );
        assert!(summary.schedule_error.is_none());
    }

    #[test]
    fn summary_of_unusable_election() {
        let mut core = ElectionCore::dated_example();
        core.election_date = Some("sometime".to_string());
        core.is_active = true;
        let election: Election = ElectionRecord { id: 5, election: core }.into();
        let summary = ElectionSummary::at(&election, Utc::now());
        assert_eq!(summary.phase, None);
        assert!(!summary.accepts_votes);
        assert!(!summary.accepts_candidacy);
        assert!(summary.schedule_error.unwrap().contains("sometime"));
    }
}
