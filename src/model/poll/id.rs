use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rocket::{
    form::{self, prelude::ErrorKind, FromFormField, ValueField},
    http::{
        impl_from_uri_param_identity,
        uri::fmt::{Query, UriDisplay},
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A poll identifier: a random UUID, rendered as 32 lowercase hex digits.
///
/// The rendered form is used verbatim as the storage key of the poll, and as
/// the prefix of every other key belonging to it.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PollId(Uuid);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid poll ID '{0}'")]
pub struct PollIdError(String);

impl PollId {
    /// Generate a fresh random ID.
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Key of the poll metadata.
    pub fn key(&self) -> String {
        self.to_string()
    }

    /// Key of the per-option vote counts.
    pub fn votes_key(&self) -> String {
        format!("{self}:votes")
    }

    /// Key of the set of voters who have cast a ballot.
    pub fn voters_key(&self) -> String {
        format!("{self}:ips")
    }

    /// Key of the set of options a single voter selected.
    pub fn selection_key(&self, voter: &str) -> String {
        format!("{self}:{voter}")
    }
}

impl Display for PollId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Accepts every textual UUID form: bare hex, hyphenated, braced and `urn:uuid:`.
impl FromStr for PollId {
    type Err = PollIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| PollIdError(s.to_string()))
    }
}

impl TryFrom<String> for PollId {
    type Error = PollIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<PollId> for String {
    fn from(id: PollId) -> Self {
        id.to_string()
    }
}

#[rocket::async_trait]
impl<'r> FromFormField<'r> for PollId {
    fn from_value(field: ValueField<'r>) -> form::Result<'r, Self> {
        field.value.parse::<PollId>().map_err(|err| {
            let error = ErrorKind::Custom(Box::new(err));
            error.into()
        })
    }
}

impl UriDisplay<Query> for PollId {
    fn fmt(&self, formatter: &mut rocket::http::uri::fmt::Formatter<'_, Query>) -> std::fmt::Result {
        formatter.write_value(&self.to_string())
    }
}

impl_from_uri_param_identity!([Query] PollId);

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: &str = "0f8fad5bd9cb469fa16570867728950e";

    #[test]
    fn random_ids_are_32_hex_digits() {
        let id = PollId::random().key();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_ascii_lowercase());
        assert_ne!(PollId::random(), PollId::random());
    }

    #[test]
    fn every_uuid_form_parses_to_the_same_id() {
        let bare: PollId = SIMPLE.parse().unwrap();
        assert_eq!(bare.key(), SIMPLE);

        for form in [
            "0F8FAD5B-D9CB-469F-A165-70867728950E",
            "0f8fad5b-d9cb-469f-a165-70867728950e",
            "{0f8fad5b-d9cb-469f-a165-70867728950e}",
            "urn:uuid:0f8fad5b-d9cb-469f-a165-70867728950e",
        ] {
            let id: PollId = form.parse().unwrap();
            assert_eq!(id, bare, "{form}");
            assert_eq!(id.key(), SIMPLE);
        }
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("".parse::<PollId>().is_err());
        assert!("not-a-poll".parse::<PollId>().is_err());
        assert!("0f8fad5bd9cb469fa16570867728950g".parse::<PollId>().is_err());
        assert!("0f8fad5b-d9cb469f-a165-70867728950e0".parse::<PollId>().is_err());
    }

    #[test]
    fn json_uses_simple_form() {
        let id: PollId = SIMPLE.parse().unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!(SIMPLE));
        let back: PollId = serde_json::from_str(r#""{0f8fad5b-d9cb-469f-a165-70867728950e}""#).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn derived_keys() {
        let id: PollId = SIMPLE.parse().unwrap();
        assert_eq!(id.votes_key(), "0f8fad5bd9cb469fa16570867728950e:votes");
        assert_eq!(id.voters_key(), "0f8fad5bd9cb469fa16570867728950e:ips");
        assert_eq!(
            id.selection_key("10.0.0.1"),
            "0f8fad5bd9cb469fa16570867728950e:10.0.0.1"
        );
    }
}
