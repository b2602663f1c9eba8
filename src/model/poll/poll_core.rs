use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Running vote count per option.
pub type Tally = BTreeMap<String, u64>;

/// Maximum length of a poll title, in characters.
pub const MAX_TITLE_LEN: usize = 100;

/// Poll metadata, exactly as stored under the poll's key.
///
/// Only construct this through [`super::PollSpec::into_poll`] for new polls,
/// which enforces the title and option constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub title: String,
    /// Options in display order, no duplicates.
    pub options: Vec<String>,
    /// Whether a ballot may select more than one option.
    #[serde(default)]
    pub multi: bool,
    /// Suspended polls refuse any further ballots.
    #[serde(default)]
    pub suspended: bool,
    /// Network origin of whoever created the poll.
    #[serde(default)]
    pub creator: Option<String>,
}

impl Poll {
    pub fn has_option(&self, option: &str) -> bool {
        self.options.iter().any(|o| o == option)
    }

    /// A tally with every option at zero.
    pub fn empty_tally(&self) -> Tally {
        self.options.iter().map(|o| (o.clone(), 0)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_json_layout() {
        let poll = Poll {
            title: "Lunch?".to_string(),
            options: vec!["Pizza".to_string(), "Sushi".to_string()],
            multi: false,
            suspended: false,
            creator: Some("10.0.0.1".to_string()),
        };
        let json = serde_json::to_value(&poll).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "title": "Lunch?",
                "options": ["Pizza", "Sushi"],
                "multi": false,
                "suspended": false,
                "creator": "10.0.0.1",
            })
        );
    }

    #[test]
    fn missing_flags_default_to_false() {
        let poll: Poll =
            serde_json::from_str(r#"{"title": "t", "options": ["a"], "creator": null}"#).unwrap();
        assert!(!poll.multi);
        assert!(!poll.suspended);
        assert_eq!(poll.creator, None);
    }

    #[test]
    fn empty_tally_covers_every_option() {
        let poll = Poll {
            title: "t".to_string(),
            options: vec!["a".to_string(), "b".to_string()],
            multi: true,
            suspended: false,
            creator: None,
        };
        let tally = poll.empty_tally();
        assert_eq!(tally.len(), 2);
        assert!(tally.values().all(|&count| count == 0));
        assert!(poll.has_option("a"));
        assert!(!poll.has_option("c"));
    }
}
