use crate::error::{Error, Result};
use crate::model::poll::Poll;

/// A validated selection of options for a specific poll.
///
/// Holding a `Ballot` means every selected option exists in the poll, the
/// selection is non-empty, and single-choice polls get exactly one option.
/// It says nothing about whether the voter has already voted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    options: Vec<String>,
}

impl Ballot {
    /// Check `selected` against the poll, in this order: unknown options,
    /// empty selection, then too many options for a single-choice poll.
    /// Repeated entries count once.
    pub fn new<S: AsRef<str>>(poll: &Poll, selected: &[S]) -> Result<Self> {
        let mut options: Vec<String> = Vec::with_capacity(selected.len());
        for option in selected.iter().map(AsRef::as_ref) {
            if !poll.has_option(option) {
                return Err(Error::InvalidOption(option.to_string()));
            }
            if !options.iter().any(|o| o == option) {
                options.push(option.to_string());
            }
        }

        if options.is_empty() {
            return Err(Error::EmptySelection);
        }
        if !poll.multi && options.len() > 1 {
            return Err(Error::MultipleSelectionNotAllowed);
        }

        Ok(Self { options })
    }

    /// Selected options, in the order first given.
    pub fn options(&self) -> &[String] {
        &self.options
    }
}
