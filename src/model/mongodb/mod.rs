mod collection;
mod errors;
mod kv;

pub use collection::{Coll, MongoCollection};
pub use errors::{duplicate_key_index, DUPLICATE_KEY};
pub use kv::{HashEntry, HashField, MongoKv, SetEntry, StringEntry};
