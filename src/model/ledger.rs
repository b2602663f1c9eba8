use log::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    api::PublicResult,
    ballot::Ballot,
    poll::{PollId, PollSpec, PollStore},
};

/// Enforces the voting rules on top of a [`PollStore`].
///
/// Everything a ballot is checked against (existence, options, the `multi`
/// and `suspended` flags) is fixed once a poll exists, so those reads need no
/// locking. The one check that can race, whether this voter has already
/// voted, is decided by a single atomic test-and-set in the store.
#[derive(Clone)]
pub struct VoteLedger {
    polls: PollStore,
}

impl VoteLedger {
    pub fn new(polls: PollStore) -> Self {
        Self { polls }
    }

    pub fn polls(&self) -> &PollStore {
        &self.polls
    }

    /// Validate and store a new poll.
    pub async fn create_poll(&self, spec: PollSpec, creator: Option<String>) -> Result<PollId> {
        let poll = spec.into_poll(creator)?;
        self.polls.create(&poll).await
    }

    pub async fn delete_poll(&self, pid: &PollId) -> Result<()> {
        self.polls.delete(pid).await?;
        info!("Deleted poll {pid}");
        Ok(())
    }

    /// Cast `voter`'s ballot for `selected` in poll `pid`.
    ///
    /// Nothing is written unless every check passes. Once the voter has been
    /// marked as voted the ballot is committed: it is recorded on a detached
    /// task that runs to completion even if the caller stops waiting. A
    /// storage failure after that point is reported, and a retry gets
    /// [`Error::AlreadyVoted`].
    pub async fn cast_vote<S: AsRef<str>>(
        &self,
        pid: &PollId,
        voter: &str,
        selected: &[S],
    ) -> Result<()> {
        let poll = self.polls.get(pid).await?;
        let ballot = Ballot::new(&poll, selected)?;
        if poll.suspended {
            return Err(Error::PollSuspended(pid.to_string()));
        }

        if !self.polls.mark_voted(pid, voter).await? {
            return Err(Error::AlreadyVoted(pid.to_string()));
        }

        let ledger = self.clone();
        let (pid, voter) = (pid.clone(), voter.to_string());
        rocket::tokio::spawn(async move { ledger.commit(&pid, &voter, &ballot).await })
            .await
            .map_err(|e| Error::Storage(format!("ballot recording task failed: {e}")))?
    }

    async fn commit(&self, pid: &PollId, voter: &str, ballot: &Ballot) -> Result<()> {
        match self.record(pid, voter, ballot).await {
            Ok(()) => {
                debug!(
                    "Recorded ballot from {voter} in poll {pid} for {:?}",
                    ballot.options()
                );
                Ok(())
            }
            Err(err @ Error::NotFound(_)) => {
                // Deleted between the checks and the claim. Sweep whatever the
                // claim recreated.
                warn!("Poll {pid} deleted while {voter} was voting");
                self.polls.delete(pid).await?;
                Err(err)
            }
            Err(err) => {
                error!("Ballot from {voter} in poll {pid} only partially recorded: {err}");
                Err(err)
            }
        }
    }

    /// The tally goes first, so a deleted poll is noticed before a selection
    /// key is written for it.
    async fn record(&self, pid: &PollId, voter: &str, ballot: &Ballot) -> Result<()> {
        for option in ballot.options() {
            self.polls.increment_tally(pid, option).await?;
            self.polls.record_selection(pid, voter, option).await?;
        }
        Ok(())
    }

    /// The poll as `voter` may see it: the tally and their own selection are
    /// only included once they have voted.
    pub async fn results(&self, pid: &PollId, voter: &str) -> Result<PublicResult> {
        let poll = self.polls.get(pid).await?;
        if !self.polls.has_voted(pid, voter).await? {
            return Ok(PublicResult::hidden(pid.clone(), poll));
        }
        let tally = self.polls.tally(pid).await?;
        let votes = self.polls.selection(pid, voter).await?;
        Ok(PublicResult::revealed(pid.clone(), poll, tally, votes))
    }
}
