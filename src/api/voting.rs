use std::sync::Arc;

use rocket::{http::Status, serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{api::VoteRequest, ledger::VoteLedger, poll::PollId};
use crate::verification::VerificationGate;

use super::common::{verify_human, ClientOrigin};

pub fn routes() -> Vec<Route> {
    routes![cast_vote]
}

/// Cast a ballot for every `option` given in the query string.
#[post("/vote?<pid>&<option>", data = "<request>", format = "json")]
async fn cast_vote(
    pid: PollId,
    option: Vec<String>,
    request: Json<VoteRequest>,
    origin: ClientOrigin,
    gate: &State<Arc<dyn VerificationGate>>,
    ledger: &State<VoteLedger>,
) -> Result<Status> {
    verify_human(gate.inner().as_ref(), request.token.as_deref(), &origin).await?;

    let voter = origin.identity()?;
    ledger.cast_vote(&pid, &voter, option.as_slice()).await?;
    Ok(Status::NoContent)
}
