use std::ops::Deref;

use mongodb::{bson::Document, Collection, Database};

use super::kv::{HashEntry, SetEntry, StringEntry};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// Every key lives in one collection, whatever the shape of its value.
const KV: &str = "kv";
impl MongoCollection for Document {
    const NAME: &'static str = KV;
}
impl MongoCollection for StringEntry {
    const NAME: &'static str = KV;
}
impl MongoCollection for HashEntry {
    const NAME: &'static str = KV;
}
impl MongoCollection for SetEntry {
    const NAME: &'static str = KV;
}
