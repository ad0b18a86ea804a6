mod commands;
mod config;
mod core;
mod models;
mod providers;
mod state;

use std::env;

use dotenv::dotenv;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::config::Config;
use crate::core::limiter::{RateLimiter, SystemClock};
use crate::core::runtime::{Runtime, RuntimeSettings};
use crate::providers::launchpad;
use crate::providers::privy::{IdentityVerifier, Privy};
use crate::providers::twitter::Twitter;
use crate::state::StateStore;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(e) = dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    // Diagnostic mode: check one handle against the identity service and
    // exit. Needs only the Privy variables, not the full configuration.
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 && args[1] == "--verify-user" {
        let handle = args
            .get(2)
            .map(String::as_str)
            .unwrap_or("elonmusk")
            .trim_start_matches('@');
        let api_url =
            env::var("PRIVY_API_URL").unwrap_or_else(|_| Privy::DEFAULT_API_URL.to_string());
        let privy = Privy::new(
            &api_url,
            env::var("PRIVY_APP_ID").ok().filter(|v| !v.is_empty()),
            env::var("PRIVY_AUTH_TOKEN").ok().filter(|v| !v.is_empty()),
        );

        info!("Checking @{} against the identity service", handle);
        if privy.verify(handle).await {
            info!("@{} is verified on the launchpad", handle);
        } else {
            info!("@{} is not verified on the launchpad", handle);
        }
        return Ok(());
    }

    let config = Config::from_env()?;

    let twitter = Twitter::new(
        &config.twitter_api_key,
        &config.twitter_api_secret,
        &config.twitter_access_token,
        &config.twitter_access_token_secret,
        &config.twitter_username,
    );

    let privy = Privy::new(
        &config.privy_api_url,
        config.privy_app_id.clone(),
        config.privy_auth_token.clone(),
    );
    if !privy.is_configured() {
        warn!("Identity service credentials not set, mention authors will be treated as unverified");
    }

    let minter = launchpad::connect(&config.rpc_url, &config.private_key, config.launchpad_address)?;

    let settings = RuntimeSettings {
        app_url: config.app_url.clone(),
        poll_interval: config.polling_interval,
        ..RuntimeSettings::default()
    };

    let mut runtime = Runtime::new(
        Box::new(twitter),
        Box::new(privy),
        Box::new(minter),
        RateLimiter::new(Box::new(SystemClock)),
        StateStore::new(&config.state_file),
        settings,
    );

    runtime.run().await
}
