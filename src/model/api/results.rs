use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::poll::{Poll, PollId, Tally};

/// What a particular voter is allowed to see of a poll.
///
/// Running results are hidden until the voter has cast their own ballot:
/// `results` and `votes` are only present when `voted` is true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicResult {
    pub pid: PollId,
    pub title: String,
    pub options: Vec<String>,
    pub multi: bool,
    pub voted: bool,
    /// Full tally, for voters only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<Tally>,
    /// The options this voter selected, for voters only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub votes: Option<BTreeSet<String>>,
}

impl PublicResult {
    /// The view of someone who hasn't voted.
    pub fn hidden(pid: PollId, poll: Poll) -> Self {
        Self {
            pid,
            title: poll.title,
            options: poll.options,
            multi: poll.multi,
            voted: false,
            results: None,
            votes: None,
        }
    }

    /// The view of someone who has voted for `votes`.
    pub fn revealed(pid: PollId, poll: Poll, tally: Tally, votes: BTreeSet<String>) -> Self {
        Self {
            voted: true,
            results: Some(tally),
            votes: Some(votes),
            ..Self::hidden(pid, poll)
        }
    }
}
