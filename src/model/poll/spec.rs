use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::poll_core::{Poll, MAX_TITLE_LEN};

/// A poll as submitted by a client, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSpec {
    pub title: String,
    pub options: Vec<String>,
    #[serde(default)]
    pub multi: bool,
    #[serde(default)]
    pub suspended: bool,
}

impl PollSpec {
    /// Check the schema constraints and produce the poll to store.
    pub fn into_poll(self, creator: Option<String>) -> Result<Poll> {
        if self.title.trim().is_empty() {
            return Err(Error::Validation("title must not be blank".to_string()));
        }
        let title_len = self.title.chars().count();
        if title_len > MAX_TITLE_LEN {
            return Err(Error::Validation(format!(
                "title is {title_len} characters long, the limit is {MAX_TITLE_LEN}"
            )));
        }
        if self.options.is_empty() {
            return Err(Error::Validation("a poll needs at least one option".to_string()));
        }
        let mut seen = HashSet::new();
        for option in self.options.iter() {
            if option.trim().is_empty() {
                return Err(Error::Validation("options must not be blank".to_string()));
            }
            if !seen.insert(option.as_str()) {
                return Err(Error::Validation(format!("duplicate option '{option}'")));
            }
        }

        Ok(Poll {
            title: self.title,
            options: self.options,
            multi: self.multi,
            suspended: self.suspended,
            creator,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_spec_becomes_poll() {
        let poll = PollSpec::example()
            .into_poll(Some("10.0.0.1".to_string()))
            .unwrap();
        assert_eq!(poll.options, vec!["A", "B"]);
        assert!(!poll.multi);
        assert!(!poll.suspended);
        assert_eq!(poll.creator.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn title_limit_counts_characters() {
        let mut spec = PollSpec::example();
        spec.title = "é".repeat(MAX_TITLE_LEN);
        assert!(spec.clone().into_poll(None).is_ok());

        spec.title.push('é');
        assert!(matches!(spec.into_poll(None), Err(Error::Validation(_))));
    }

    #[test]
    fn blank_title_rejected() {
        let mut spec = PollSpec::example();
        spec.title = "   ".to_string();
        assert!(matches!(spec.into_poll(None), Err(Error::Validation(_))));
    }

    #[test]
    fn empty_options_rejected() {
        let mut spec = PollSpec::example();
        spec.options.clear();
        assert!(matches!(spec.into_poll(None), Err(Error::Validation(_))));
    }

    #[test]
    fn duplicate_options_rejected() {
        let mut spec = PollSpec::multi_example();
        spec.options.push("Fruit".to_string());
        assert!(matches!(spec.into_poll(None), Err(Error::Validation(_))));
    }

    #[test]
    fn blank_option_rejected() {
        let mut spec = PollSpec::example();
        spec.options.push(String::new());
        assert!(matches!(spec.into_poll(None), Err(Error::Validation(_))));
    }

    #[test]
    fn whitespace_option_rejected() {
        let mut spec = PollSpec::example();
        spec.options.push(" \t".to_string());
        assert!(matches!(spec.into_poll(None), Err(Error::Validation(_))));
    }

    #[test]
    fn flags_default_to_false() {
        let spec: PollSpec =
            serde_json::from_str(r#"{"title": "t", "options": ["x", "y"]}"#).unwrap();
        assert!(!spec.multi);
        assert!(!spec.suspended);
    }
}
