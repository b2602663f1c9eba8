pub mod api;
pub mod ballot;
pub mod kv;
pub mod ledger;
pub mod mongodb;
pub mod poll;
