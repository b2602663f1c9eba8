use std::sync::Arc;

use rocket::{serde::json::Json, Route, State};

use crate::error::Result;
use crate::model::{
    api::{CreatePollRequest, CreatedPoll, PublicResult},
    ledger::VoteLedger,
    poll::PollId,
};
use crate::verification::VerificationGate;

use super::common::{verify_human, ClientOrigin};

pub fn routes() -> Vec<Route> {
    routes![create_poll, delete_poll, poll_results]
}

#[post("/", data = "<request>", format = "json")]
async fn create_poll(
    request: Json<CreatePollRequest>,
    origin: ClientOrigin,
    gate: &State<Arc<dyn VerificationGate>>,
    ledger: &State<VoteLedger>,
) -> Result<Json<CreatedPoll>> {
    let request = request.into_inner();
    verify_human(gate.inner().as_ref(), request.token.as_deref(), &origin).await?;

    let creator = origin.ip().map(|ip| ip.to_string());
    let pid = ledger.create_poll(request.spec, creator).await?;
    Ok(Json(CreatedPoll { pid }))
}

#[delete("/?<pid>")]
async fn delete_poll(pid: PollId, ledger: &State<VoteLedger>) -> Result<()> {
    ledger.delete_poll(&pid).await
}

#[get("/?<pid>")]
async fn poll_results(
    pid: PollId,
    origin: ClientOrigin,
    ledger: &State<VoteLedger>,
) -> Result<Json<PublicResult>> {
    let voter = origin.identity()?;
    let results = ledger.results(&pid, &voter).await?;
    Ok(Json(results))
}
