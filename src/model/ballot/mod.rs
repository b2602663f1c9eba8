pub use ballot_core::Ballot;

mod ballot_core;
