use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Answers whether a mention author has an account on the launchpad.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, handle: &str) -> bool;
}

#[derive(Debug, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: Vec<PrivyUser>,
}

#[derive(Debug, Deserialize)]
pub struct PrivyUser {
    pub id: String,
    #[serde(default)]
    pub linked_accounts: Vec<PrivyLinkedAccount>,
}

#[derive(Debug, Deserialize)]
pub struct PrivyLinkedAccount {
    #[serde(rename = "type")]
    pub account_type: String,
}

pub struct Privy {
    client: reqwest::Client,
    api_url: String,
    app_id: Option<String>,
    auth_token: Option<String>,
}

impl Privy {
    pub const DEFAULT_API_URL: &'static str = "https://auth.privy.io/api/v1";

    pub fn new(api_url: &str, app_id: Option<String>, auth_token: Option<String>) -> Self {
        Privy {
            client: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            app_id,
            auth_token,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.app_id.is_some() && self.auth_token.is_some()
    }
}

#[async_trait]
impl IdentityVerifier for Privy {
    /// Look the Twitter handle up in the launchpad's user base. Without
    /// credentials the author counts as unverified, and so does any error
    /// along the way.
    async fn verify(&self, handle: &str) -> bool {
        let username = handle.trim_start_matches('@');

        let (app_id, auth_token) = match (&self.app_id, &self.auth_token) {
            (Some(app_id), Some(auth_token)) => (app_id, auth_token),
            _ => {
                warn!("Identity service is not configured, treating @{} as unverified", username);
                return false;
            }
        };

        let url = format!("{}/users", self.api_url);
        let response = match self
            .client
            .get(&url)
            .query(&[("app_id", app_id.as_str()), ("twitter_handle", username)])
            .bearer_auth(auth_token)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Identity lookup failed for @{}: {}", username, e);
                return false;
            }
        };

        let status = response.status();
        if status.as_u16() == 404 {
            info!("@{} has no account on the launchpad", username);
            return false;
        }
        if !status.is_success() {
            warn!("Identity lookup for @{} returned status {}", username, status);
            return false;
        }

        let payload: UsersResponse = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Error parsing identity response for @{}: {}", username, e);
                return false;
            }
        };

        let user = match payload.users.first() {
            Some(user) => user,
            None => {
                info!("@{} has no account on the launchpad", username);
                return false;
            }
        };
        debug!("Identity service matched @{} to user {}", username, user.id);

        let has_twitter = user
            .linked_accounts
            .iter()
            .any(|account| account.account_type == "twitter_oauth");
        if !has_twitter {
            // Account exists but Twitter is not among its linked logins.
            warn!("@{} is registered but has no linked Twitter login", username);
        }
        true
    }
}
