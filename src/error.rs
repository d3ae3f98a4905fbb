use std::fmt::Display;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use log::{error, warn};
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::{
    common::election::{CandidateId, ElectionId, Phase, ScheduleError},
    store::StoreError,
};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Election {0} has no usable schedule: {1}")]
    InvalidElectionSchedule(ElectionId, ScheduleError),
    #[error("Election {election_id} is not open for voting (phase: {phase:?})")]
    ElectionNotVotable {
        election_id: ElectionId,
        /// `None` if the election does not exist.
        phase: Option<Phase>,
    },
    #[error("Candidate {candidate_id} is not contesting election {election_id}")]
    CandidateNotInContest {
        election_id: ElectionId,
        candidate_id: CandidateId,
    },
    #[error("No registered voter for '{0}'")]
    VoterNotRegistered(String),
    #[error("Voter has already voted in election {0}")]
    DuplicateVote(ElectionId),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::Status(Status::NotFound, format!("{what} not found"))
    }

    pub fn bad_request(why: impl Display) -> Self {
        Self::Status(Status::BadRequest, why.to_string())
    }

    pub fn status(&self) -> Status {
        match self {
            Self::InvalidElectionSchedule(..) => Status::UnprocessableEntity,
            Self::ElectionNotVotable { .. } | Self::DuplicateVote(_) => Status::Conflict,
            Self::CandidateNotInContest { .. } => Status::NotFound,
            Self::VoterNotRegistered(_) => Status::Forbidden,
            Self::StoreUnavailable(_) => Status::ServiceUnavailable,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Status(status, _) => *status,
        }
    }

    /// A stable machine-readable name for this kind of error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidElectionSchedule(..) => "invalid_election_schedule",
            Self::ElectionNotVotable { .. } => "election_not_votable",
            Self::CandidateNotInContest { .. } => "candidate_not_in_contest",
            Self::VoterNotRegistered(_) => "voter_not_registered",
            Self::DuplicateVote(_) => "duplicate_vote",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Jwt(_) => "invalid_token",
            Self::Status(..) => "request_failed",
        }
    }

    /// The message to show the person who made the request.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidElectionSchedule(..) => {
                "This election's dates are not set up correctly, so voting is not available. \
                 Please contact the election administrator."
                    .to_string()
            }
            Self::ElectionNotVotable { phase, .. } => match phase {
                Some(Phase::Upcoming) | Some(Phase::PreVoting) => {
                    "Voting for this election has not opened yet.".to_string()
                }
                Some(Phase::Ended) => "Voting for this election has closed.".to_string(),
                _ => "This election is not accepting votes.".to_string(),
            },
            Self::CandidateNotInContest { .. } => {
                "The selected candidate is not standing in this election.".to_string()
            }
            Self::VoterNotRegistered(_) => {
                "You need to register as a voter before you can vote.".to_string()
            }
            Self::DuplicateVote(_) => "You have already voted in this election.".to_string(),
            Self::StoreUnavailable(_) => {
                "The election service could not be reached. Please try again.".to_string()
            }
            Self::Jwt(_) => "Your sign-in is invalid or has expired.".to_string(),
            Self::Status(_, message) => message.clone(),
        }
    }

    /// Whether repeating the same action unchanged might succeed.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(what) => {
                Self::Status(Status::Conflict, format!("Already exists: {what}"))
            }
            other => Self::StoreUnavailable(other),
        }
    }
}

/// The JSON body sent for every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub kind: &'static str,
    pub message: String,
    pub retryable: bool,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
            retryable: err.retryable(),
        }
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        (status, Json(ErrorBody::from(&self))).respond_to(req)
    }
}
