use chrono::{DateTime, Utc};
use log::warn;
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::Election;

use super::schedule::Schedule;

/// Stages in the election lifecycle, relative to a given instant.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    /// Not yet open; candidacy applications are accepted.
    Upcoming,
    /// Candidacy closed, candidates viewable, voting not yet open.
    PreVoting,
    /// Votes are accepted.
    Active,
    /// Voting has closed.
    Ended,
}

impl Phase {
    /// May candidates apply in this phase?
    pub fn accepts_candidacy(self) -> bool {
        self == Self::Upcoming
    }

    /// May votes be cast in this phase?
    pub fn accepts_votes(self) -> bool {
        self == Self::Active
    }
}

impl From<Phase> for Bson {
    fn from(phase: Phase) -> Self {
        to_bson(&phase).expect("Serialisation is infallible")
    }
}

impl Schedule {
    /// The phase this schedule is in at `now`.
    pub fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        let opens = self.voting_opens();
        if now > self.voting_closes() {
            Phase::Ended
        } else if now >= opens {
            Phase::Active
        } else {
            match self.nominations_close() {
                Some(close) if now >= close => Phase::PreVoting,
                _ => Phase::Upcoming,
            }
        }
    }
}

/// The phase of an election at `now`, by its dates alone.
pub fn resolve_phase(election: &Election, now: DateTime<Utc>) -> Result<Phase> {
    election
        .schedule()
        .map(|schedule| schedule.phase_at(now))
        .map_err(|e| Error::InvalidElectionSchedule(election.id, e.clone()))
}

/// The phase of an election at `now` for the purpose of deciding whether a vote may be cast.
///
/// `is_active` opens voting early, but never reopens an election whose dates have passed;
/// only an explicit administrative override can do that.
pub fn voting_phase(election: &Election, now: DateTime<Utc>) -> Result<Phase> {
    let phase = resolve_phase(election, now)?;
    Ok(match phase {
        Phase::Upcoming | Phase::PreVoting if election.is_active => Phase::Active,
        Phase::Ended => match election.voting_override {
            Some(ref grant) => {
                warn!(
                    "Election {} has ended but voting is held open by override from {} ({})",
                    election.id, grant.granted_by, grant.reason
                );
                Phase::Active
            }
            None => Phase::Ended,
        },
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone};

    use crate::model::db::{ElectionCore, ElectionRecord, ScheduleWindow, VotingOverride};

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn election(core: ElectionCore) -> Election {
        ElectionRecord { id: 1, election: core }.into()
    }

    #[test]
    fn scheduled_election_phases() {
        let election = election(ElectionCore::scheduled_example());
        assert_eq!(
            resolve_phase(&election, at(2025, 10, 9, 0)).unwrap(),
            Phase::Upcoming
        );
        assert_eq!(
            resolve_phase(&election, at(2025, 10, 12, 0)).unwrap(),
            Phase::Active
        );
        assert_eq!(
            resolve_phase(&election, at(2025, 10, 16, 0)).unwrap(),
            Phase::Ended
        );
    }

    #[test]
    fn scheduled_window_boundaries_are_inclusive() {
        let election = election(ElectionCore::scheduled_example());
        let start = at(2025, 10, 10, 8);
        let end = at(2025, 10, 15, 18);
        let nano = Duration::nanoseconds(1);
        assert_eq!(resolve_phase(&election, start - nano).unwrap(), Phase::Upcoming);
        assert_eq!(resolve_phase(&election, start).unwrap(), Phase::Active);
        assert_eq!(resolve_phase(&election, end).unwrap(), Phase::Active);
        assert_eq!(resolve_phase(&election, end + nano).unwrap(), Phase::Ended);
    }

    #[test]
    fn date_derived_phases() {
        let election = election(ElectionCore::dated_example());
        let date = Utc.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2025, 9, 5)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
        );
        assert_eq!(
            resolve_phase(&election, date - Duration::days(40)).unwrap(),
            Phase::Upcoming
        );
        assert_eq!(
            resolve_phase(&election, date - Duration::days(15)).unwrap(),
            Phase::PreVoting
        );
        assert_eq!(resolve_phase(&election, date).unwrap(), Phase::Active);
        assert_eq!(
            resolve_phase(&election, date + Duration::hours(23)).unwrap(),
            Phase::Active
        );
        assert_eq!(
            resolve_phase(&election, date + Duration::days(1)).unwrap(),
            Phase::Ended
        );
    }

    /// Sweep `now` across an election and check the phase only ever moves forward,
    /// changing exactly once per boundary.
    fn assert_monotonic(election: &Election, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<Phase> {
        let mut seen = vec![];
        let mut now = from;
        while now <= to {
            let phase = resolve_phase(election, now).unwrap();
            match seen.last() {
                Some(&last) if last == phase => {}
                Some(&last) => {
                    assert!(last < phase, "{phase:?} after {last:?} at {now}");
                    seen.push(phase);
                }
                None => seen.push(phase),
            }
            now = now + Duration::minutes(30);
        }
        seen
    }

    #[test]
    fn phases_are_monotonic() {
        let mut core = ElectionCore::scheduled_example();
        core.schedule = Some(ScheduleWindow {
            nomination_end: Some("2025-10-01T00:00:00".to_string()),
            ..ScheduleWindow::example()
        });
        let seen = assert_monotonic(&election(core), at(2025, 9, 1, 0), at(2025, 11, 1, 0));
        assert_eq!(
            seen,
            vec![Phase::Upcoming, Phase::PreVoting, Phase::Active, Phase::Ended]
        );

        let seen = assert_monotonic(
            &election(ElectionCore::dated_example()),
            at(2025, 6, 1, 0),
            at(2025, 10, 1, 0),
        );
        assert_eq!(
            seen,
            vec![Phase::Upcoming, Phase::PreVoting, Phase::Active, Phase::Ended]
        );
    }

    #[test]
    fn unusable_dates_fail() {
        let mut core = ElectionCore::dated_example();
        core.election_date = Some("next tuesday".to_string());
        let result = resolve_phase(&election(core), at(2025, 9, 1, 0));
        assert!(matches!(result, Err(Error::InvalidElectionSchedule(1, _))));

        let mut core = ElectionCore::dated_example();
        core.election_date = None;
        core.is_active = true;
        let result = voting_phase(&election(core), at(2025, 9, 1, 0));
        assert!(matches!(result, Err(Error::InvalidElectionSchedule(1, _))));
    }

    #[test]
    fn active_flag_opens_early_but_cannot_reopen() {
        let mut core = ElectionCore::scheduled_example();
        core.is_active = true;
        let election = election(core);
        assert_eq!(
            voting_phase(&election, at(2025, 10, 9, 0)).unwrap(),
            Phase::Active
        );
        assert_eq!(
            voting_phase(&election, at(2025, 10, 16, 0)).unwrap(),
            Phase::Ended
        );
        // The date-only view is unaffected.
        assert_eq!(
            resolve_phase(&election, at(2025, 10, 9, 0)).unwrap(),
            Phase::Upcoming
        );
    }

    #[test]
    fn inactive_flag_does_not_close_window() {
        let election = election(ElectionCore::scheduled_example());
        assert!(!election.is_active);
        assert_eq!(
            voting_phase(&election, at(2025, 10, 12, 0)).unwrap(),
            Phase::Active
        );
    }

    #[test]
    fn override_reopens_ended_election() {
        let mut core = ElectionCore::scheduled_example();
        core.voting_override = Some(VotingOverride::example());
        let election = election(core);
        assert_eq!(
            resolve_phase(&election, at(2025, 10, 16, 0)).unwrap(),
            Phase::Ended
        );
        assert_eq!(
            voting_phase(&election, at(2025, 10, 16, 0)).unwrap(),
            Phase::Active
        );
        // An override does not open voting before the window.
        assert_eq!(
            voting_phase(&election, at(2025, 10, 9, 0)).unwrap(),
            Phase::Upcoming
        );
    }
}
