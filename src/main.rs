use clap::Parser;
use rocket::figment::Figment;
use std::net::IpAddr;

use killboard_api::config::KillboardConfig;

#[derive(Parser, Debug)]
#[command(
    name = "killboard-api",
    about = "Read-only HTTP API over stored killmails"
)]
struct Args {
    /// Address to bind (overrides `address` in Rocket.toml).
    #[arg(long)]
    address: Option<IpAddr>,

    /// Port to bind (overrides `port` in Rocket.toml).
    #[arg(long)]
    port: Option<u16>,

    /// MongoDB connection string (overrides `databases.killboard.url`).
    #[arg(long, env = "KILLBOARD_MONGO_URI")]
    mongo_uri: Option<String>,
}

impl Args {
    fn apply(self, mut figment: Figment) -> Figment {
        if let Some(address) = self.address {
            figment = figment.merge(("address", address));
        }
        if let Some(port) = self.port {
            figment = figment.merge(("port", port));
        }
        if let Some(uri) = self.mongo_uri {
            figment = figment.merge(("databases.killboard.url", uri));
        }
        figment
    }
}

#[rocket::main]
async fn main() {
    let args = Args::parse();
    let figment = args.apply(rocket::Config::figment());

    // Ignite fails when the store is unreachable; exit instead of serving errors
    if let Err(err) = killboard_api::build(figment, KillboardConfig::from_env())
        .launch()
        .await
    {
        log::error!("killboard api stopped: {}", err);
        std::process::exit(1);
    }
}
