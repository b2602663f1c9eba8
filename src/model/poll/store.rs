use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::kv::{KvStore, KvValue};

use super::{id::PollId, poll_core::Poll, poll_core::Tally};

/// Attempts at finding an unused ID before giving up.
const MAX_CREATE_ATTEMPTS: usize = 3;

/// Key-value representation of polls, their tallies and their voter records.
///
/// | Key               | Value                          |
/// |-------------------|--------------------------------|
/// | `<pid>`           | poll metadata as JSON          |
/// | `<pid>:votes`     | hash of option -> count        |
/// | `<pid>:ips`       | set of voters who have voted   |
/// | `<pid>:<voter>`   | set of options that voter chose |
#[derive(Clone)]
pub struct PollStore {
    kv: Arc<dyn KvStore>,
}

impl PollStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Store a new poll with all-zero tallies under a fresh ID.
    pub async fn create(&self, poll: &Poll) -> Result<PollId> {
        let metadata =
            serde_json::to_string(poll).map_err(|e| Error::Storage(e.to_string()))?;
        let tally: BTreeMap<String, i64> = poll
            .options
            .iter()
            .map(|option| (option.clone(), 0))
            .collect();

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let pid = PollId::random();
            let entries = vec![
                (pid.to_string(), KvValue::String(metadata.clone())),
                (pid.votes_key(), KvValue::Hash(tally.clone())),
            ];
            if self.kv.create(entries).await? {
                info!("Created poll {pid} with {} option(s)", poll.options.len());
                return Ok(pid);
            }
            warn!("Poll ID {pid} already in use, drawing another");
        }

        Err(Error::Storage(format!(
            "no unused poll ID found after {MAX_CREATE_ATTEMPTS} attempts"
        )))
    }

    pub async fn exists(&self, pid: &PollId) -> Result<bool> {
        self.kv.exists(&pid.key()).await
    }

    pub async fn get(&self, pid: &PollId) -> Result<Poll> {
        let raw = self
            .kv
            .get_string(&pid.key())
            .await?
            .ok_or_else(|| Error::not_found(format!("Poll with ID '{pid}'")))?;
        serde_json::from_str(&raw).map_err(|e| Error::corrupt(pid.key(), e))
    }

    /// Remove the poll and everything recorded against it. Deleting a poll
    /// that doesn't exist is not an error.
    pub async fn delete(&self, pid: &PollId) -> Result<()> {
        let voters = self.kv.set_members(&pid.voters_key()).await?;
        let mut keys = vec![pid.to_string(), pid.votes_key(), pid.voters_key()];
        keys.extend(voters.iter().map(|voter| pid.selection_key(voter)));
        self.kv.delete(&keys).await?;
        debug!("Deleted poll {pid} and {} voter record(s)", voters.len());
        Ok(())
    }

    pub async fn tally(&self, pid: &PollId) -> Result<Tally> {
        let key = pid.votes_key();
        self.kv
            .hash_get_all(&key)
            .await?
            .into_iter()
            .map(|(option, count)| match u64::try_from(count) {
                Ok(count) => Ok((option, count)),
                Err(_) => Err(Error::corrupt(
                    key.as_str(),
                    format!("negative count {count} for '{option}'"),
                )),
            })
            .collect()
    }

    /// Atomically add one vote for `option`.
    ///
    /// Fails with [`Error::NotFound`] if the tally is gone, which means the
    /// poll was deleted, and with [`Error::InvalidOption`] otherwise.
    pub async fn increment_tally(&self, pid: &PollId, option: &str) -> Result<()> {
        let key = pid.votes_key();
        if self.kv.hash_increment(&key, option, 1).await? {
            Ok(())
        } else if self.kv.exists(&key).await? {
            Err(Error::InvalidOption(option.to_string()))
        } else {
            Err(Error::not_found(format!("Tally of poll '{pid}'")))
        }
    }

    pub async fn has_voted(&self, pid: &PollId, voter: &str) -> Result<bool> {
        self.kv.set_contains(&pid.voters_key(), voter).await
    }

    /// Atomically mark `voter` as having voted.
    ///
    /// Returns `false` if they already had, so of any number of concurrent
    /// calls for the same voter exactly one sees `true`.
    pub async fn mark_voted(&self, pid: &PollId, voter: &str) -> Result<bool> {
        self.kv.set_add(&pid.voters_key(), voter).await
    }

    pub async fn record_selection(&self, pid: &PollId, voter: &str, option: &str) -> Result<()> {
        self.kv.set_add(&pid.selection_key(voter), option).await?;
        Ok(())
    }

    pub async fn selection(&self, pid: &PollId, voter: &str) -> Result<BTreeSet<String>> {
        self.kv.set_members(&pid.selection_key(voter)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::{kv::MemoryKv, poll::PollSpec};

    fn store() -> (PollStore, MemoryKv) {
        let kv = MemoryKv::new();
        (PollStore::new(Arc::new(kv.clone())), kv)
    }

    fn example_poll() -> Poll {
        PollSpec::multi_example()
            .into_poll(Some("10.0.0.1".to_string()))
            .unwrap()
    }

    #[rocket::async_test]
    async fn create_then_get() {
        let (polls, _) = store();
        let poll = example_poll();

        let pid = polls.create(&poll).await.unwrap();

        assert!(polls.exists(&pid).await.unwrap());
        assert_eq!(polls.get(&pid).await.unwrap(), poll);
    }

    #[rocket::async_test]
    async fn tally_starts_at_zero_for_every_option() {
        let (polls, _) = store();
        let poll = example_poll();

        let pid = polls.create(&poll).await.unwrap();

        let tally = polls.tally(&pid).await.unwrap();
        assert_eq!(tally, poll.empty_tally());
        let keys = tally.keys().cloned().collect::<BTreeSet<_>>();
        let options = poll.options.iter().cloned().collect::<BTreeSet<_>>();
        assert_eq!(keys, options);
    }

    #[rocket::async_test]
    async fn missing_poll_is_not_found() {
        let (polls, _) = store();
        let pid = PollId::random();

        assert!(!polls.exists(&pid).await.unwrap());
        assert!(matches!(polls.get(&pid).await, Err(Error::NotFound(_))));
    }

    #[rocket::async_test]
    async fn unreadable_metadata_is_corrupt() {
        let (polls, kv) = store();
        let pid = PollId::random();
        let garbage = vec![(pid.to_string(), KvValue::String("{\"title\": 7}".to_string()))];
        kv.create(garbage).await.unwrap();

        assert!(polls.exists(&pid).await.unwrap());
        assert!(matches!(
            polls.get(&pid).await,
            Err(Error::CorruptData { .. })
        ));
    }

    #[rocket::async_test]
    async fn increment_known_and_unknown_options() {
        let (polls, _) = store();
        let pid = polls.create(&example_poll()).await.unwrap();

        polls.increment_tally(&pid, "Fruit").await.unwrap();
        polls.increment_tally(&pid, "Fruit").await.unwrap();
        let result = polls.increment_tally(&pid, "Cake").await;
        assert!(matches!(result, Err(Error::InvalidOption(o)) if o == "Cake"));
        let result = polls.increment_tally(&PollId::random(), "Fruit").await;
        assert!(matches!(result, Err(Error::NotFound(_))));

        let tally = polls.tally(&pid).await.unwrap();
        assert_eq!(tally["Fruit"], 2);
        assert_eq!(tally["Crisps"], 0);
        assert!(!tally.contains_key("Cake"));
    }

    #[rocket::async_test]
    async fn mark_voted_is_test_and_set() {
        let (polls, _) = store();
        let pid = polls.create(&example_poll()).await.unwrap();

        assert!(!polls.has_voted(&pid, "10.0.0.2").await.unwrap());
        assert!(polls.mark_voted(&pid, "10.0.0.2").await.unwrap());
        assert!(!polls.mark_voted(&pid, "10.0.0.2").await.unwrap());
        assert!(polls.has_voted(&pid, "10.0.0.2").await.unwrap());
    }

    #[rocket::async_test]
    async fn delete_removes_every_key() {
        let (polls, kv) = store();
        let pid = polls.create(&example_poll()).await.unwrap();
        for voter in ["10.0.0.2", "::1"] {
            polls.mark_voted(&pid, voter).await.unwrap();
            polls.record_selection(&pid, voter, "Fruit").await.unwrap();
            polls.increment_tally(&pid, "Fruit").await.unwrap();
        }
        let other = polls.create(&example_poll()).await.unwrap();

        polls.delete(&pid).await.unwrap();

        assert!(!polls.exists(&pid).await.unwrap());
        let keys = kv.keys().unwrap();
        assert!(keys.iter().all(|key| !key.starts_with(&pid.key())));
        // The other poll is untouched.
        assert_eq!(
            keys,
            BTreeSet::from([other.to_string(), other.votes_key()])
        );
    }

    #[rocket::async_test]
    async fn delete_missing_poll_is_ok() {
        let (polls, _) = store();
        polls.delete(&PollId::random()).await.unwrap();
    }
}
