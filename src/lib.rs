#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use std::sync::Arc;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod verification;

use config::{StoreFairing, VerificationFairing};
use logging::LoggerFairing;
use model::{kv::KvStore, ledger::VoteLedger, poll::PollStore};
use verification::VerificationGate;

/// The server as configured by `Rocket.toml` and `ROCKET_*` variables. The
/// store and the verification gate are set up during ignition.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(StoreFairing)
        .attach(VerificationFairing)
        .attach(LoggerFairing)
}

/// The server over an already opened store and gate.
pub fn rocket_for_store_and_gate(
    kv: Arc<dyn KvStore>,
    gate: Arc<dyn VerificationGate>,
) -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .manage(VoteLedger::new(PollStore::new(kv)))
        .manage(gate)
        .attach(LoggerFairing)
}
