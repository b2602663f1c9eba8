use std::collections::{BTreeMap, BTreeSet};

use log::{debug, warn};
use mongodb::{
    bson::{doc, Document},
    error::{Error as DbError, ErrorKind},
    options::{InsertManyOptions, UpdateOptions},
    Database,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::kv::{KvStore, KvValue};

use super::{collection::Coll, errors::duplicate_key_index};

/// A string value, stored as `{_id: key, value}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StringEntry {
    #[serde(rename = "_id")]
    pub key: String,
    pub value: String,
}

/// A hash value, stored as `{_id: key, fields: [{name, count}]}`.
///
/// Fields are kept as an array rather than a sub-document so that any
/// string, including ones with `.` or `$` in them, can be a field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashEntry {
    #[serde(rename = "_id")]
    pub key: String,
    pub fields: Vec<HashField>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HashField {
    pub name: String,
    pub count: i64,
}

/// A set value, stored as `{_id: key, members: [...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetEntry {
    #[serde(rename = "_id")]
    pub key: String,
    pub members: Vec<String>,
}

/// Key-value store on top of a single MongoDB collection.
///
/// Each key is one document. Atomicity comes from MongoDB's single-document
/// guarantees: increments use `$inc` and set insertion uses `$addToSet`.
#[derive(Clone)]
pub struct MongoKv {
    documents: Coll<Document>,
    strings: Coll<StringEntry>,
    hashes: Coll<HashEntry>,
    sets: Coll<SetEntry>,
}

impl MongoKv {
    pub fn new(db: &Database) -> Self {
        Self {
            documents: Coll::from_db(db),
            strings: Coll::from_db(db),
            hashes: Coll::from_db(db),
            sets: Coll::from_db(db),
        }
    }
}

/// Build the document holding `value` under `key`.
fn value_document(key: String, value: KvValue) -> Document {
    match value {
        KvValue::String(value) => doc! { "_id": key, "value": value },
        KvValue::Hash(fields) => {
            let fields = fields
                .into_iter()
                .map(|(name, count)| doc! { "name": name, "count": count })
                .collect::<Vec<_>>();
            doc! { "_id": key, "fields": fields }
        }
        KvValue::Set(members) => {
            let members = members.into_iter().collect::<Vec<_>>();
            doc! { "_id": key, "members": members }
        }
    }
}

/// A document that exists but doesn't have the expected shape is corrupt,
/// rather than a storage failure.
fn read_error(key: &str, err: DbError) -> Error {
    match *err.kind {
        ErrorKind::BsonDeserialization(ref e) => Error::corrupt(key, e),
        _ => err.into(),
    }
}

#[rocket::async_trait]
impl KvStore for MongoKv {
    async fn create(&self, entries: Vec<(String, KvValue)>) -> Result<bool> {
        let documents = entries
            .into_iter()
            .map(|(key, value)| value_document(key, value))
            .collect::<Vec<_>>();
        // Ordered, so a clash on the first document means nothing was written.
        let options = InsertManyOptions::builder().ordered(true).build();
        match self.documents.insert_many(documents, options).await {
            Ok(_) => Ok(true),
            Err(err) => match duplicate_key_index(&err) {
                Some(0) => Ok(false),
                Some(index) => {
                    warn!("Multi-key create clashed after writing {index} document(s)");
                    Err(err.into())
                }
                None => Err(err.into()),
            },
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let count = self
            .documents
            .count_documents(doc! { "_id": key }, None)
            .await?;
        Ok(count > 0)
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        let entry = self
            .strings
            .find_one(doc! { "_id": key }, None)
            .await
            .map_err(|e| read_error(key, e))?;
        Ok(entry.map(|entry| entry.value))
    }

    async fn delete(&self, keys: &[String]) -> Result<()> {
        let result = self
            .documents
            .delete_many(doc! { "_id": { "$in": keys.to_vec() } }, None)
            .await?;
        debug!("Deleted {} of {} key(s)", result.deleted_count, keys.len());
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> Result<BTreeMap<String, i64>> {
        let entry = self
            .hashes
            .find_one(doc! { "_id": key }, None)
            .await
            .map_err(|e| read_error(key, e))?;
        Ok(entry
            .map(|entry| {
                entry
                    .fields
                    .into_iter()
                    .map(|field| (field.name, field.count))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> Result<bool> {
        let filter = doc! { "_id": key, "fields.name": field };
        let update = doc! { "$inc": { "fields.$.count": by } };
        let result = self.hashes.update_one(filter, update, None).await?;
        Ok(result.matched_count > 0)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        let filter = doc! { "_id": key };
        let update = doc! { "$addToSet": { "members": member } };
        let upsert = UpdateOptions::builder().upsert(true).build();
        let result = match self
            .sets
            .update_one(filter.clone(), update.clone(), upsert)
            .await
        {
            Ok(result) => result,
            // Two upserts raced to create the set; the other one won, so the
            // document exists now and a plain update is enough.
            Err(err) if duplicate_key_index(&err).is_some() => {
                self.sets.update_one(filter, update, None).await?
            }
            Err(err) => return Err(err.into()),
        };
        Ok(result.upserted_id.is_some() || result.modified_count > 0)
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool> {
        let count = self
            .sets
            .count_documents(doc! { "_id": key, "members": member }, None)
            .await?;
        Ok(count > 0)
    }

    async fn set_members(&self, key: &str) -> Result<BTreeSet<String>> {
        let entry = self
            .sets
            .find_one(doc! { "_id": key }, None)
            .await
            .map_err(|e| read_error(key, e))?;
        Ok(entry
            .map(|entry| entry.members.into_iter().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use mongodb::bson::from_document;

    #[test]
    fn hash_document_round_trips_through_entry() {
        let fields = BTreeMap::from([("a.b".to_string(), 0), ("$c".to_string(), 3)]);
        let document = value_document("pid:votes".to_string(), KvValue::Hash(fields));

        let entry: HashEntry = from_document(document).unwrap();
        assert_eq!(entry.key, "pid:votes");
        let names = entry
            .fields
            .iter()
            .map(|f| (f.name.as_str(), f.count))
            .collect::<Vec<_>>();
        assert_eq!(names, vec![("$c", 3), ("a.b", 0)]);
    }

    #[test]
    fn string_and_set_documents_match_entries() {
        let document = value_document("pid".to_string(), KvValue::String("{}".to_string()));
        let entry: StringEntry = from_document(document).unwrap();
        assert_eq!(entry.value, "{}");

        let members = BTreeSet::from(["10.0.0.1".to_string()]);
        let document = value_document("pid:ips".to_string(), KvValue::Set(members));
        let entry: SetEntry = from_document(document).unwrap();
        assert_eq!(entry.members, vec!["10.0.0.1"]);
    }

    fn hash(fields: &[(&str, i64)]) -> KvValue {
        KvValue::Hash(
            fields
                .iter()
                .map(|(name, count)| (name.to_string(), *count))
                .collect(),
        )
    }

    #[backend_test(mongodb)]
    async fn create_refuses_taken_keys(store: MongoKv) {
        let first = vec![
            ("p".to_string(), KvValue::String("{}".to_string())),
            ("p:votes".to_string(), hash(&[("A", 0)])),
        ];
        assert!(store.create(first).await.unwrap());

        let clash = vec![
            ("p".to_string(), KvValue::String("overwritten".to_string())),
            ("q".to_string(), KvValue::String("{}".to_string())),
        ];
        assert!(!store.create(clash).await.unwrap());
        assert_eq!(store.get_string("p").await.unwrap().as_deref(), Some("{}"));
        assert!(!store.exists("q").await.unwrap());
    }

    #[backend_test(mongodb)]
    async fn hash_increment_only_touches_existing_fields(store: MongoKv) {
        let fields = hash(&[("a.b", 0), ("$c", 0)]);
        store
            .create(vec![("h".to_string(), fields)])
            .await
            .unwrap();

        assert!(store.hash_increment("h", "a.b", 1).await.unwrap());
        assert!(store.hash_increment("h", "a.b", 1).await.unwrap());
        assert!(store.hash_increment("h", "$c", 1).await.unwrap());
        assert!(!store.hash_increment("h", "missing", 1).await.unwrap());
        assert!(!store.hash_increment("missing", "a.b", 1).await.unwrap());

        let all = store.hash_get_all("h").await.unwrap();
        assert_eq!(
            all,
            BTreeMap::from([("a.b".to_string(), 2), ("$c".to_string(), 1)])
        );
        assert!(store.hash_get_all("missing").await.unwrap().is_empty());
    }

    #[backend_test(mongodb)]
    async fn set_add_reports_new_members(store: MongoKv) {
        assert!(store.set_add("s", "10.0.0.1").await.unwrap());
        assert!(!store.set_add("s", "10.0.0.1").await.unwrap());
        assert!(store.set_add("s", "::1").await.unwrap());

        assert!(store.set_contains("s", "::1").await.unwrap());
        assert!(!store.set_contains("s", "10.0.0.2").await.unwrap());
        assert!(!store.set_contains("missing", "::1").await.unwrap());
        assert_eq!(
            store.set_members("s").await.unwrap(),
            BTreeSet::from(["10.0.0.1".to_string(), "::1".to_string()])
        );
    }

    #[backend_test(mongodb)]
    async fn racing_set_adds_admit_one_member(store: MongoKv) {
        let handles = (0..16)
            .map(|_| {
                let store = store.clone();
                rocket::tokio::spawn(async move { store.set_add("race", "X").await })
            })
            .collect::<Vec<_>>();
        let mut added = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                added += 1;
            }
        }
        assert_eq!(added, 1);
    }

    #[backend_test(mongodb)]
    async fn delete_ignores_missing_keys(store: MongoKv) {
        store.set_add("s", "m").await.unwrap();
        store
            .create(vec![("t".to_string(), KvValue::String("{}".to_string()))])
            .await
            .unwrap();

        store
            .delete(&["s".to_string(), "missing".to_string()])
            .await
            .unwrap();

        assert!(!store.exists("s").await.unwrap());
        assert!(store.exists("t").await.unwrap());
    }

    #[backend_test(mongodb)]
    async fn wrong_shape_is_corrupt_data(store: MongoKv) {
        store.set_add("s", "m").await.unwrap();
        assert!(matches!(
            store.get_string("s").await,
            Err(Error::CorruptData { .. })
        ));
    }
}
