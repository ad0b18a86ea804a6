use std::env;
use std::time::Duration;

use alloy::primitives::Address;

use crate::providers::privy::Privy;
use crate::state::StateStore;

const MANTLE_SEPOLIA_RPC: &str = "https://rpc.sepolia.mantle.xyz";
const DEFAULT_LAUNCHPAD_ADDRESS: &str = "0x709F1b8Dc07A7D099825360283410999af09CAC9";
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15 * 60);

/// Everything the bot needs from the environment, validated up front so a
/// bad deployment dies before the loop starts.
pub struct Config {
    pub twitter_api_key: String,
    pub twitter_api_secret: String,
    pub twitter_access_token: String,
    pub twitter_access_token_secret: String,
    pub twitter_username: String,
    pub privy_api_url: String,
    pub privy_app_id: Option<String>,
    pub privy_auth_token: Option<String>,
    pub app_url: String,
    pub polling_interval: Duration,
    pub rpc_url: String,
    pub launchpad_address: Address,
    pub private_key: String,
    pub state_file: String,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let polling_interval = match env::var("POLLING_INTERVAL") {
            Ok(raw) => {
                let millis: u64 = raw.parse().map_err(|_| {
                    anyhow::anyhow!("POLLING_INTERVAL must be a number of milliseconds")
                })?;
                Duration::from_millis(millis)
            }
            Err(_) => DEFAULT_POLL_INTERVAL,
        };

        let launchpad_address: Address = env_var_or("LAUNCHPAD_ADDRESS", DEFAULT_LAUNCHPAD_ADDRESS)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid LAUNCHPAD_ADDRESS: {}", e))?;

        Ok(Config {
            twitter_api_key: env_var("TWITTER_API_KEY")?,
            twitter_api_secret: env_var("TWITTER_API_SECRET")?,
            twitter_access_token: env_var("TWITTER_ACCESS_TOKEN")?,
            twitter_access_token_secret: env_var("TWITTER_ACCESS_TOKEN_SECRET")?,
            twitter_username: env_var("TWITTER_USERNAME")?,
            privy_api_url: env_var_or("PRIVY_API_URL", Privy::DEFAULT_API_URL),
            // Empty strings count as unset so a blank .env line does not
            // half-configure the verifier.
            privy_app_id: env::var("PRIVY_APP_ID").ok().filter(|v| !v.is_empty()),
            privy_auth_token: env::var("PRIVY_AUTH_TOKEN").ok().filter(|v| !v.is_empty()),
            app_url: env_var_or("APP_URL", "https://meme-launchpad.vercel.app"),
            polling_interval,
            rpc_url: env_var_or("MANTLE_RPC_URL", MANTLE_SEPOLIA_RPC),
            launchpad_address,
            private_key: env_var("PRIVATE_KEY")?,
            state_file: env_var_or("STATE_FILE", StateStore::DEFAULT_PATH),
        })
    }
}

fn env_var(name: &str) -> Result<String, anyhow::Error> {
    env::var(name).map_err(|_| anyhow::anyhow!("{} not set", name))
}

fn env_var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}
