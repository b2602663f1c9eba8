use std::collections::{hash_map::Entry, BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};

use super::{KvStore, KvValue};

/// An in-process store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryKv {
    entries: Arc<Mutex<HashMap<String, KvValue>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every key currently held.
    pub fn keys(&self) -> Result<BTreeSet<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, KvValue>>> {
        self.entries
            .lock()
            .map_err(|_| Error::Storage("in-memory store lock poisoned".to_string()))
    }
}

fn wrong_type(key: &str, expected: &str, found: &KvValue) -> Error {
    Error::corrupt(
        key,
        format!("expected a {expected}, found a {}", found.type_name()),
    )
}

#[rocket::async_trait]
impl KvStore for MemoryKv {
    async fn create(&self, entries: Vec<(String, KvValue)>) -> Result<bool> {
        let mut map = self.lock()?;
        if entries.iter().any(|(key, _)| map.contains_key(key)) {
            return Ok(false);
        }
        map.extend(entries);
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        match self.lock()?.get(key) {
            None => Ok(None),
            Some(KvValue::String(value)) => Ok(Some(value.clone())),
            Some(other) => Err(wrong_type(key, "string", other)),
        }
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        let mut map = self.lock()?;
        for key in keys {
            map.remove(key);
        }
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, i64>> {
        match self.lock()?.get(key) {
            None => Ok(BTreeMap::new()),
            Some(KvValue::Hash(fields)) => Ok(fields.clone()),
            Some(other) => Err(wrong_type(key, "hash", other)),
        }
    }

    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<bool> {
        match self.lock()?.get_mut(key) {
            None => Ok(false),
            Some(KvValue::Hash(fields)) => match fields.get_mut(field) {
                Some(count) => {
                    *count += by;
                    Ok(true)
                }
                None => Ok(false),
            },
            Some(other) => Err(wrong_type(key, "hash", other)),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        match self.lock()?.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(KvValue::Set(BTreeSet::from([member.to_string()])));
                Ok(true)
            }
            Entry::Occupied(mut occupied) => match occupied.get_mut() {
                KvValue::Set(members) => Ok(members.insert(member.to_string())),
                other => Err(wrong_type(key, "set", other)),
            },
        }
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        match self.lock()?.get(key) {
            None => Ok(false),
            Some(KvValue::Set(members)) => Ok(members.contains(member)),
            Some(other) => Err(wrong_type(key, "set", other)),
        }
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        match self.lock()?.get(key) {
            None => Ok(BTreeSet::new()),
            Some(KvValue::Set(members)) => Ok(members.clone()),
            Some(other) => Err(wrong_type(key, "set", other)),
        }
    }
}
