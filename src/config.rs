use std::sync::Arc;

use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    kv::{KvStore, MemoryKv},
    ledger::VoteLedger,
    mongodb::MongoKv,
    poll::PollStore,
};
use crate::verification::{Recaptcha, VerificationGate};

/// Which key-value backend to keep polls in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Mongodb,
    Memory,
}

/// Configuration for the poll store, derived from `Rocket.toml` and
/// `ROCKET_*` environment variables.
#[derive(Debug, Deserialize)]
struct StoreConfig {
    // non-secrets
    #[serde(default)]
    store: StoreKind,
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: Option<String>,
}

fn default_db_name() -> String {
    "polls".to_string()
}

/// A fairing that loads the store config, opens the configured backend, and
/// places a [`VoteLedger`] over it into managed state.
pub struct StoreFairing;

#[rocket::async_trait]
impl Fairing for StoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Poll store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<StoreConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load store config: {e}");
                return Err(rocket);
            }
        };

        let kv: Arc<dyn KvStore> = match config.store {
            StoreKind::Memory => {
                info!("Keeping polls in memory; they will not survive a restart");
                Arc::new(MemoryKv::new())
            }
            StoreKind::Mongodb => {
                let Some(db_uri) = config.db_uri else {
                    error!("`db_uri` must be set when `store` is \"mongodb\"");
                    return Err(rocket);
                };
                info!("Loaded database config, connecting...");
                let client = match MongoClient::with_uri_str(db_uri).await {
                    Ok(client) => client,
                    Err(e) => {
                        error!("Failed to connect to database: {e}");
                        return Err(rocket);
                    }
                };
                info!("...database connection online!");
                Arc::new(MongoKv::new(&client.database(&config.db_name)))
            }
        };

        Ok(rocket.manage(VoteLedger::new(PollStore::new(kv))))
    }
}

/// Configuration for human verification.
#[derive(Deserialize)]
struct RecaptchaConfig {
    // secrets
    recaptcha_secret: String,
}

/// A fairing that loads the reCAPTCHA secret and places the verification
/// gate into managed state.
pub struct VerificationFairing;

#[rocket::async_trait]
impl Fairing for VerificationFairing {
    fn info(&self) -> Info {
        Info {
            name: "reCAPTCHA",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<RecaptchaConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load reCAPTCHA config: {e}");
                return Err(rocket);
            }
        };
        info!("Loaded reCAPTCHA config");

        let gate: Arc<dyn VerificationGate> = Arc::new(Recaptcha::new(config.recaptcha_secret));
        Ok(rocket.manage(gate))
    }
}

#[cfg(test)]
mod tests {
    use rocket::{
        error::ErrorKind,
        figment::{
            providers::{Format, Toml},
            Figment,
        },
    };

    use super::*;

    #[test]
    fn store_defaults_to_mongodb() {
        let config: StoreConfig = Figment::new()
            .merge(Toml::string(r#"db_uri = "mongodb://localhost""#))
            .extract()
            .unwrap();
        assert_eq!(config.store, StoreKind::Mongodb);
        assert_eq!(config.db_name, "polls");
        assert_eq!(config.db_uri.as_deref(), Some("mongodb://localhost"));
    }

    #[test]
    fn memory_store_needs_no_uri() {
        let config: StoreConfig = Figment::new()
            .merge(Toml::string(r#"store = "memory""#))
            .extract()
            .unwrap();
        assert_eq!(config.store, StoreKind::Memory);
        assert_eq!(config.db_uri, None);
    }

    #[rocket::async_test]
    async fn memory_store_fairing_manages_ledger() {
        let figment = Figment::from(rocket::Config::debug_default())
            .merge(("store", "memory"))
            .merge(("recaptcha_secret", "secret"));
        let rocket = rocket::custom(figment)
            .attach(StoreFairing)
            .attach(VerificationFairing)
            .ignite()
            .await
            .unwrap();
        assert!(rocket.state::<VoteLedger>().is_some());
        assert!(rocket.state::<Arc<dyn VerificationGate>>().is_some());
    }

    #[rocket::async_test]
    async fn missing_secret_aborts_ignition() {
        let figment = Figment::from(rocket::Config::debug_default()).merge(("store", "memory"));
        let result = rocket::custom(figment)
            .attach(VerificationFairing)
            .ignite()
            .await;
        match result {
            Ok(_) => panic!("ignition should fail without `recaptcha_secret`"),
            Err(e) => assert!(matches!(e.kind(), ErrorKind::FailedFairings(_))),
        }
    }
}
