use rocket_db_pools::{Database, mongodb};

/// MongoDB client configured under `databases.killboard` in the Rocket figment.
#[derive(Database)]
#[database("killboard")]
pub struct KillboardDb(mongodb::Client);
