#[macro_use]
extern crate rocket;

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod query;
pub mod request_logger;
pub mod routes;
pub mod service;
pub mod store;

use crate::config::KillboardConfig;
use crate::db::KillboardDb;
use crate::request_logger::RequestLogger;
use crate::store::{KillmailStore, MongoKillmailStore, SharedStore};
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use std::sync::{Arc, Once};

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

/// Rocket instance configured from `Rocket.toml` and the environment.
pub fn rocket() -> Rocket<Build> {
    build(rocket::Config::figment(), KillboardConfig::from_env())
}

pub fn build(figment: Figment, config: KillboardConfig) -> Rocket<Build> {
    init_logger();

    log::info!(
        "serving killmails from {}.{} (filter mode {:?}, query timeout {:?})",
        config.database,
        config.collection,
        config.filter_mode,
        config.query_timeout
    );

    // Public read API: any origin may issue GETs
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(vec![Method::Get].into_iter().map(From::from).collect())
        .to_cors()
        .expect("Error creating CORS");

    let store_config = config.clone();

    rocket::custom(figment)
        .attach(RequestLogger)
        .attach(KillboardDb::init())
        .attach(cors)
        // Wrap the client in the store, refusing to launch if the server is unreachable
        .attach(AdHoc::try_on_ignite(
            "Killmail Store",
            |rocket| async move {
                let Some(db) = KillboardDb::fetch(&rocket) else {
                    log::error!("mongodb client not available");
                    return Err(rocket);
                };

                let store = MongoKillmailStore::new(db, &store_config);
                match tokio::time::timeout(store_config.query_timeout, store.ping()).await {
                    Ok(Ok(())) => {
                        log::info!("connected to mongodb");
                        let shared: SharedStore = Arc::new(store);
                        Ok(rocket.manage(shared))
                    }
                    Ok(Err(e)) => {
                        log::error!("mongodb ping failed: {}", e);
                        Err(rocket)
                    }
                    Err(_) => {
                        log::error!(
                            "mongodb ping timed out after {:?}",
                            store_config.query_timeout
                        );
                        Err(rocket)
                    }
                }
            },
        ))
        .manage(config)
        .mount("/", routes::api_routes())
        .register("/", routes::catchers::all())
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket};
    use rocket_db_pools::mongodb::bson::{self, Document, doc};
    use std::sync::Arc;

    use crate::config::KillboardConfig;
    use crate::routes;
    use crate::store::{MemoryKillmailStore, SharedStore};

    pub use database::{TestDatabase, TestDatabaseError};

    /// Builder for stored killmail documents.
    ///
    /// Every fixture starts with one attacker and a victim whose ids are
    /// derived from the killmail id, so they never collide with ids chosen
    /// by a test.
    #[derive(Debug, Clone)]
    pub struct KillmailFixture {
        id: i64,
        attackers: Vec<Document>,
        victim: Document,
        solar_system_id: i64,
        derived: bool,
    }

    impl KillmailFixture {
        pub fn new(id: i64) -> Self {
            Self {
                id,
                attackers: vec![attacker_document(90_000_000 + id, 98_000_001, None, true)],
                victim: victim_document(91_000_000 + id, 98_000_002, None),
                solar_system_id: 30_000_142,
                derived: true,
            }
        }

        /// Add another attacker.
        pub fn attacker(
            mut self,
            character_id: i64,
            corporation_id: i64,
            alliance_id: Option<i64>,
        ) -> Self {
            self.attackers.push(attacker_document(
                character_id,
                corporation_id,
                alliance_id,
                false,
            ));
            self
        }

        /// Replace the victim.
        pub fn victim(
            mut self,
            character_id: i64,
            corporation_id: i64,
            alliance_id: Option<i64>,
        ) -> Self {
            self.victim = victim_document(character_id, corporation_id, alliance_id);
            self
        }

        pub fn solar_system(mut self, solar_system_id: i64) -> Self {
            self.solar_system_id = solar_system_id;
            self
        }

        /// Drop the derived attributes, as for a record not yet post-processed.
        pub fn without_axiom(mut self) -> Self {
            self.derived = false;
            self
        }

        pub fn into_document(self) -> Document {
            let mut document = doc! {
                "_id": self.id,
                "killmail": {
                    "attackers": self.attackers,
                    "killmail_id": self.id,
                    "killmail_time": bson::DateTime::from_millis(1_600_000_000_000 + self.id * 60_000),
                    "solar_system_id": self.solar_system_id,
                    "victim": self.victim,
                },
            };
            if self.derived {
                document.insert(
                    "axiom",
                    doc! {
                        "ship": { "hp": 2500.0, "dps": 310.5 },
                        "drones": [{ "dps": 42.0 }],
                    },
                );
            }
            document
        }
    }

    fn attacker_document(
        character_id: i64,
        corporation_id: i64,
        alliance_id: Option<i64>,
        final_blow: bool,
    ) -> Document {
        let mut document = doc! {
            "corporation_id": corporation_id,
            "character_id": character_id,
            "damage_done": 1500,
            "final_blow": final_blow,
            "security_status": -0.5,
            "ship_type_id": 587,
            "weapon_type_id": 2488,
        };
        if let Some(alliance_id) = alliance_id {
            document.insert("alliance_id", alliance_id);
        }
        document
    }

    fn victim_document(
        character_id: i64,
        corporation_id: i64,
        alliance_id: Option<i64>,
    ) -> Document {
        let mut document = doc! {
            "corporation_id": corporation_id,
            "character_id": character_id,
            "damage_taken": 1500,
            "items": [
                { "flag": 27, "item_type_id": 2488, "quantity_destroyed": 1, "singleton": 0 },
                { "flag": 5, "item_type_id": 34, "quantity_dropped": 1000, "singleton": 0 },
            ],
            "position": { "x": 1.0e12, "y": -2.5e11, "z": 3.0e10 },
            "ship_type_id": 603,
        };
        if let Some(alliance_id) = alliance_id {
            document.insert("alliance_id", alliance_id);
        }
        document
    }

    pub mod database {
        use rocket_db_pools::mongodb::bson::{Document, doc};
        use rocket_db_pools::mongodb::{self, Client};
        use testcontainers_modules::mongo::Mongo;
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        use crate::config::KillboardConfig;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("neither TEST_MONGODB_URI nor TEST_MONGODB_CONTAINER is set")]
            MissingUrl,
            #[error("database error: {0}")]
            Mongo(#[from] mongodb::error::Error),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Throwaway MongoDB database for integration tests.
        pub struct TestDatabase {
            client: Client,
            database_name: String,
            dropped: bool,
            container: Option<ContainerAsync<Mongo>>,
        }

        impl TestDatabase {
            /// Use `TEST_MONGODB_URI` when set, otherwise start a disposable
            /// container when `TEST_MONGODB_CONTAINER` is set.
            pub async fn new_from_env() -> Result<Self, TestDatabaseError> {
                if let Ok(uri) = std::env::var("TEST_MONGODB_URI") {
                    return Self::connect(&uri, None).await;
                }
                if std::env::var_os("TEST_MONGODB_CONTAINER").is_some() {
                    return Self::new().await;
                }
                Err(TestDatabaseError::MissingUrl)
            }

            /// Provision a fresh database inside a MongoDB container.
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = Mongo::default().start().await?;
                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(27017).await?;
                let uri = format!("mongodb://{}:{}", host, port);

                Self::connect(&uri, Some(container)).await
            }

            async fn connect(
                uri: &str,
                container: Option<ContainerAsync<Mongo>>,
            ) -> Result<Self, TestDatabaseError> {
                let client = Client::with_uri_str(uri).await?;
                let database_name = format!("killboard_test_{}", Uuid::new_v4().simple());
                client
                    .database(&database_name)
                    .run_command(doc! { "ping": 1 }, None)
                    .await?;

                Ok(Self {
                    client,
                    database_name,
                    dropped: false,
                    container,
                })
            }

            pub fn client(&self) -> &Client {
                &self.client
            }

            /// Service configuration pointing at this database.
            pub fn config(&self) -> KillboardConfig {
                KillboardConfig {
                    database: self.database_name.clone(),
                    ..KillboardConfig::default()
                }
            }

            /// Insert raw documents into the killmail collection.
            pub async fn seed(&self, documents: Vec<Document>) -> Result<(), TestDatabaseError> {
                let config = self.config();
                self.client
                    .database(&self.database_name)
                    .collection::<Document>(&config.collection)
                    .insert_many(documents, None)
                    .await?;
                Ok(())
            }

            /// Drop the database and stop the container, if any.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                self.client.database(&self.database_name).drop(None).await?;
                self.dropped = true;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if !self.dropped {
                    let database = self.client.database(&self.database_name);
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            let _ = database.drop(None).await;
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for route tests.
    pub struct TestRocketBuilder {
        figment: Figment,
        config: KillboardConfig,
        store: Option<SharedStore>,
    }

    impl Default for TestRocketBuilder {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                config: KillboardConfig::default(),
                store: None,
            }
        }

        /// Serve requests from `store` instead of an empty in-memory store.
        pub fn manage_store(mut self, store: SharedStore) -> Self {
            self.store = Some(store);
            self
        }

        pub fn config(mut self, config: KillboardConfig) -> Self {
            self.config = config;
            self
        }

        /// Finish building the Rocket instance with every API route mounted.
        pub fn build(self) -> Rocket<Build> {
            let store = self
                .store
                .unwrap_or_else(|| Arc::new(MemoryKillmailStore::default()) as SharedStore);

            rocket::custom(self.figment)
                .manage(store)
                .manage(self.config)
                .mount("/", routes::api_routes())
                .register("/", routes::catchers::all())
        }

        /// Convenience helper to produce a blocking local client.
        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        /// Convenience helper to produce an asynchronous local client.
        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
