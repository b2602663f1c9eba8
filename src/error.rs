use log::{error, warn};
use mongodb::error::Error as DbError;
use rocket::{
    http::{Status, StatusClass},
    response::{self, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid option: {0}")]
    InvalidOption(String),
    #[error("Ballot does not select any options")]
    EmptySelection,
    #[error("Poll only accepts a single option per ballot")]
    MultipleSelectionNotAllowed,
    #[error("Poll {0} is suspended")]
    PollSuspended(String),
    #[error("Already voted in poll {0}")]
    AlreadyVoted(String),
    #[error("Corrupt data under key '{key}': {reason}")]
    CorruptData { key: String, reason: String },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Storage failure: {0}")]
    Storage(String),
    #[error("Human verification failed: {0}")]
    VerificationFailed(String),
    #[error("Invalid poll: {0}")]
    Validation(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn corrupt(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::CorruptData {
            key: key.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable, machine-readable code identifying the kind of rejection.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::InvalidOption(_) => "invalid_option",
            Self::EmptySelection => "empty_selection",
            Self::MultipleSelectionNotAllowed => "multiple_selection_not_allowed",
            Self::PollSuspended(_) => "poll_suspended",
            Self::AlreadyVoted(_) => "already_voted",
            Self::CorruptData { .. } => "corrupt_data",
            Self::Db(_) | Self::Storage(_) => "storage_error",
            Self::VerificationFailed(_) => "verification_failed",
            Self::Validation(_) => "validation_error",
            Self::BadRequest(_) => "bad_request",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::NotFound(_) => Status::NotFound,
            Self::InvalidOption(_)
            | Self::EmptySelection
            | Self::MultipleSelectionNotAllowed
            | Self::VerificationFailed(_)
            | Self::Validation(_)
            | Self::BadRequest(_) => Status::BadRequest,
            Self::PollSuspended(_) => Status::Forbidden,
            Self::AlreadyVoted(_) => Status::MethodNotAllowed,
            Self::CorruptData { .. } | Self::Db(_) | Self::Storage(_) => {
                Status::InternalServerError
            }
        }
    }
}

/// Body sent alongside every rejected request.
#[derive(Debug, Serialize)]
struct Rejection {
    reason: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        match status.class() {
            StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        let body = Rejection {
            reason: self.reason(),
            message: self.to_string(),
        };
        (status, Json(body)).respond_to(req)
    }
}
