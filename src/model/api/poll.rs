use serde::{Deserialize, Serialize};

use crate::model::poll::{PollId, PollSpec};

/// Body of a poll creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePollRequest {
    /// reCAPTCHA response token. Checked before anything else happens.
    pub token: Option<String>,
    #[serde(flatten)]
    pub spec: PollSpec,
}

/// Response to a successful poll creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedPoll {
    pub pid: PollId,
}
