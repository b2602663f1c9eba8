mod id;
mod poll_core;
mod spec;
mod store;

pub use id::{PollId, PollIdError};
pub use poll_core::{Poll, Tally, MAX_TITLE_LEN};
pub use spec::PollSpec;
pub use store::PollStore;
