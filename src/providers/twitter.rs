use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest_oauth1::OAuthClientProvider;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{BotIdentity, MentionRecord};

const SEARCH_RECENT_URL: &str = "https://api.twitter.com/2/tweets/search/recent";
const POST_TWEET_URL: &str = "https://api.twitter.com/2/tweets";
const LEGACY_SEARCH_URL: &str = "https://api.twitter.com/1.1/search/tweets.json";
const LEGACY_UPDATE_URL: &str = "https://api.twitter.com/1.1/statuses/update.json";
const VERIFY_CREDENTIALS_URL: &str = "https://api.twitter.com/1.1/account/verify_credentials.json";

const PAGE_SIZE: u32 = 10;

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("rate limited by the API")]
    RateLimited,
    #[error("endpoint unavailable: {0}")]
    Unavailable(StatusCode),
    #[error("API request failed with status {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl FeedError {
    pub fn from_status(status: StatusCode, body: String) -> FeedError {
        match status.as_u16() {
            429 => FeedError::RateLimited,
            403 | 404 | 410 => FeedError::Unavailable(status),
            _ => FeedError::Api { status, body },
        }
    }
}

/// Mention feed operations. Search results come back newest first.
#[async_trait]
pub trait FeedApi: Send + Sync {
    async fn verify_credentials(&self) -> Result<BotIdentity, FeedError>;
    async fn search_recent(&self, since_id: Option<&str>) -> Result<Vec<MentionRecord>, FeedError>;
    async fn search_legacy(&self, since_id: Option<&str>) -> Result<Vec<MentionRecord>, FeedError>;
    async fn post_reply(&self, target_id: &str, message: &str) -> Result<(), FeedError>;
    async fn post_reply_legacy(&self, target_id: &str, message: &str) -> Result<(), FeedError>;
}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub data: Vec<TweetData>,
    #[serde(default)]
    pub includes: Includes,
}

#[derive(Debug, Deserialize)]
pub struct TweetData {
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct Includes {
    #[serde(default)]
    pub users: Vec<UserData>,
}

#[derive(Debug, Deserialize)]
pub struct UserData {
    pub id: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct LegacySearchResponse {
    #[serde(default)]
    pub statuses: Vec<LegacyTweet>,
}

#[derive(Debug, Deserialize)]
pub struct LegacyTweet {
    pub id_str: String,
    #[serde(default)]
    pub full_text: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    pub user: LegacyUser,
}

#[derive(Debug, Deserialize)]
pub struct LegacyUser {
    pub id_str: String,
    pub screen_name: String,
}

#[derive(Debug, Deserialize)]
struct CredentialsResponse {
    id_str: String,
    screen_name: String,
}

#[derive(Debug, Serialize)]
struct ReplyRequest<'a> {
    text: &'a str,
    reply: ReplyTarget<'a>,
}

#[derive(Debug, Serialize)]
struct ReplyTarget<'a> {
    in_reply_to_tweet_id: &'a str,
}

pub struct Twitter {
    client: reqwest::Client,
    consumer_key: String,
    consumer_secret: String,
    access_token: String,
    access_token_secret: String,
    username: String,
}

impl Twitter {
    pub fn new(
        consumer_key: &str,
        consumer_secret: &str,
        access_token: &str,
        access_token_secret: &str,
        username: &str,
    ) -> Self {
        Twitter {
            client: reqwest::Client::new(),
            consumer_key: consumer_key.to_string(),
            consumer_secret: consumer_secret.to_string(),
            access_token: access_token.to_string(),
            access_token_secret: access_token_secret.to_string(),
            username: username.to_string(),
        }
    }

    fn secrets(&self) -> reqwest_oauth1::Secrets<'_> {
        reqwest_oauth1::Secrets::new(self.consumer_key.as_str(), self.consumer_secret.as_str())
            .token(self.access_token.as_str(), self.access_token_secret.as_str())
    }

    /// Flatten a v2 search payload, joining author handles in from the
    /// user expansion.
    pub fn mentions_from_search(payload: SearchResponse) -> Vec<MentionRecord> {
        let mut handles = HashMap::new();
        for user in payload.includes.users {
            handles.insert(user.id, user.username);
        }

        payload
            .data
            .into_iter()
            .map(|tweet| {
                let author_id = tweet.author_id.unwrap_or_default();
                let author_handle = handles
                    .get(&author_id)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string());
                MentionRecord {
                    id: tweet.id,
                    text: tweet.text,
                    author_id,
                    author_handle,
                    created_at: tweet.created_at,
                }
            })
            .collect()
    }

    /// Flatten a v1.1 search payload. The legacy query cannot exclude the
    /// bot's own tweets, so they are filtered out here.
    pub fn mentions_from_legacy(payload: LegacySearchResponse, own_username: &str) -> Vec<MentionRecord> {
        payload
            .statuses
            .into_iter()
            .filter(|status| !status.user.screen_name.eq_ignore_ascii_case(own_username))
            .map(|status| MentionRecord {
                id: status.id_str,
                text: status.full_text.or(status.text).unwrap_or_default(),
                author_id: status.user.id_str,
                author_handle: status.user.screen_name,
                created_at: status.created_at,
            })
            .collect()
    }
}

#[async_trait]
impl FeedApi for Twitter {
    async fn verify_credentials(&self) -> Result<BotIdentity, FeedError> {
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .get(VERIFY_CREDENTIALS_URL)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::from_status(status, body));
        }

        let credentials: CredentialsResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(BotIdentity {
            id: credentials.id_str,
            handle: credentials.screen_name,
        })
    }

    async fn search_recent(&self, since_id: Option<&str>) -> Result<Vec<MentionRecord>, FeedError> {
        let query = format!("@{} -from:{}", self.username, self.username);
        let mut params = vec![
            ("query", query),
            ("max_results", PAGE_SIZE.to_string()),
            ("expansions", "author_id".to_string()),
            ("tweet.fields", "created_at,author_id,text".to_string()),
            ("user.fields", "username".to_string()),
        ];
        if let Some(since_id) = since_id {
            params.push(("since_id", since_id.to_string()));
        }

        debug!("Searching recent mentions of @{}", self.username);
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .get(SEARCH_RECENT_URL)
            .query(&params)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::from_status(status, body));
        }

        let payload: SearchResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(Self::mentions_from_search(payload))
    }

    async fn search_legacy(&self, since_id: Option<&str>) -> Result<Vec<MentionRecord>, FeedError> {
        let query = format!("@{}", self.username);
        let mut params = vec![
            ("q", query),
            ("count", PAGE_SIZE.to_string()),
            ("result_type", "recent".to_string()),
            ("tweet_mode", "extended".to_string()),
        ];
        if let Some(since_id) = since_id {
            params.push(("since_id", since_id.to_string()));
        }

        debug!("Searching mentions of @{} via the legacy API", self.username);
        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .get(LEGACY_SEARCH_URL)
            .query(&params)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::from_status(status, body));
        }

        let payload: LegacySearchResponse = response
            .json()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;
        Ok(Self::mentions_from_legacy(payload, &self.username))
    }

    async fn post_reply(&self, target_id: &str, message: &str) -> Result<(), FeedError> {
        let request = ReplyRequest {
            text: message,
            reply: ReplyTarget {
                in_reply_to_tweet_id: target_id,
            },
        };
        let body = serde_json::to_string(&request).map_err(|e| FeedError::Transport(e.to_string()))?;

        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .post(POST_TWEET_URL)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::from_status(status, body));
        }
        Ok(())
    }

    async fn post_reply_legacy(&self, target_id: &str, message: &str) -> Result<(), FeedError> {
        let params = [
            ("status", message),
            ("in_reply_to_status_id", target_id),
            ("auto_populate_reply_metadata", "true"),
        ];

        let response = self
            .client
            .clone()
            .oauth1(self.secrets())
            .post(LEGACY_UPDATE_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FeedError::from_status(status, body));
        }
        Ok(())
    }
}
