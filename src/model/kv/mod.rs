//! The key-value boundary the poll store is written against.
//!
//! Values are strings, hashes of integer counters, or sets of strings, in the
//! style of Redis. Every method is a single atomic operation on the backing
//! store; callers never need to lock anything themselves.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;

mod memory;

pub use memory::MemoryKv;

/// A value held under a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KvValue {
    String(String),
    Hash(BTreeMap<String, i64>),
    Set(BTreeSet<String>),
}

impl KvValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Hash(_) => "hash",
            Self::Set(_) => "set",
        }
    }
}

#[rocket::async_trait]
pub trait KvStore: Send + Sync {
    /// Write all `entries`, provided none of their keys exist yet.
    ///
    /// Returns `false`, having written nothing, if a key is already taken.
    async fn create(&self, entries: Vec<(String, KvValue)>) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Remove every listed key. Missing keys are ignored.
    async fn delete(&self, keys: &[String]) -> Result<()>;

    /// All fields of a hash; empty if the key is missing.
    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, i64>>;

    /// Atomically add `by` to an existing hash field.
    ///
    /// Returns `false` if the key or the field does not exist, in which case
    /// nothing is written.
    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<bool>;

    /// Atomically add `member` to a set, creating the set if needed.
    ///
    /// Returns `true` iff the member was not present before.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool>;

    /// All members of a set; empty if the key is missing.
    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>>;
}
