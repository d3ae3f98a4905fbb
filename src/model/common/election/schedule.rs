use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use log::warn;
use thiserror::Error;

/// Length of the viewing-only window before a date-derived election day.
pub const PRE_VOTING_DAYS: i64 = 30;

/// When an election runs, resolved once when the election is loaded.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Schedule {
    /// An explicit voting window, optionally preceded by a nomination deadline.
    Explicit {
        nominations_close: Option<DateTime<Utc>>,
        voting_start: DateTime<Utc>,
        voting_end: DateTime<Utc>,
    },
    /// Voting happens on a single election day, with a fixed viewing-only window before it.
    DerivedFromDate { date: NaiveDate },
}

/// Reasons an election's dates cannot be turned into a [`Schedule`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("no complete voting window and no election date")]
    MissingDate,
    #[error("election date '{0}' is not a valid date")]
    MalformedDate(String),
    #[error("voting window ends at {end} before it starts at {start}")]
    InvertedWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("nominations close at {close}, after voting starts at {start}")]
    NominationsAfterStart {
        close: DateTime<Utc>,
        start: DateTime<Utc>,
    },
}

impl Schedule {
    /// Build an explicit schedule, checking the window is the right way round.
    pub fn explicit(
        nominations_close: Option<DateTime<Utc>>,
        voting_start: DateTime<Utc>,
        voting_end: DateTime<Utc>,
    ) -> Result<Self, ScheduleError> {
        if voting_end < voting_start {
            return Err(ScheduleError::InvertedWindow {
                start: voting_start,
                end: voting_end,
            });
        }
        if let Some(close) = nominations_close {
            if close > voting_start {
                return Err(ScheduleError::NominationsAfterStart {
                    close,
                    start: voting_start,
                });
            }
        }
        Ok(Self::Explicit {
            nominations_close,
            voting_start,
            voting_end,
        })
    }

    /// Resolve the schedule from the raw stored fields.
    ///
    /// A window is only used if both ends are present and parse; otherwise the
    /// election date is the fallback, and must itself be present and valid.
    pub fn from_fields(
        election_date: Option<&str>,
        nomination_end: Option<&str>,
        voting_start: Option<&str>,
        voting_end: Option<&str>,
    ) -> Result<Self, ScheduleError> {
        let start = voting_start.and_then(parse_instant);
        let end = voting_end.and_then(parse_instant);
        if let (Some(start), Some(end)) = (start, end) {
            let close = nomination_end.and_then(parse_instant);
            return Self::explicit(close, start, end);
        }
        if voting_start.is_some() || voting_end.is_some() {
            warn!("Ignoring incomplete voting window ({voting_start:?}, {voting_end:?})");
        }

        let raw = election_date.ok_or(ScheduleError::MissingDate)?;
        let date = parse_date(raw).ok_or_else(|| ScheduleError::MalformedDate(raw.to_string()))?;
        Ok(Self::DerivedFromDate { date })
    }

    /// The first instant at which votes are accepted.
    pub fn voting_opens(&self) -> DateTime<Utc> {
        match *self {
            Self::Explicit { voting_start, .. } => voting_start,
            Self::DerivedFromDate { date } => start_of(date),
        }
    }

    /// The last instant at which votes are accepted.
    pub fn voting_closes(&self) -> DateTime<Utc> {
        match *self {
            Self::Explicit { voting_end, .. } => voting_end,
            Self::DerivedFromDate { date } => {
                start_of(date) + Duration::days(1) - Duration::nanoseconds(1)
            }
        }
    }

    /// The instant candidacy applications close, if the schedule has one.
    pub fn nominations_close(&self) -> Option<DateTime<Utc>> {
        match *self {
            Self::Explicit {
                nominations_close, ..
            } => nominations_close,
            Self::DerivedFromDate { date } => {
                Some(start_of(date) - Duration::days(PRE_VOTING_DAYS))
            }
        }
    }
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

/// Parse a stored timestamp. Timestamps without an offset are taken to be UTC.
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Some(instant.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Parse a stored calendar date, tolerating a timestamp in its place.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| parse_instant(raw).map(|instant| instant.date_naive()))
}
