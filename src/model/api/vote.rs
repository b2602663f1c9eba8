use serde::{Deserialize, Serialize};

/// Body of a vote request. The poll and the selected options travel in the
/// query string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    /// reCAPTCHA response token.
    pub token: Option<String>,
}
