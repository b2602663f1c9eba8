//! API-compatible types.
//!
//! The types in this module are what the HTTP layer reads from request
//! bodies and writes to response bodies.

pub mod poll;
pub mod results;
pub mod vote;

pub use poll::{CreatePollRequest, CreatedPoll};
pub use results::PublicResult;
pub use vote::VoteRequest;
