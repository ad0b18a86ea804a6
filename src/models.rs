use serde::{Deserialize, Serialize};

/// Bot progress, persisted between runs. Field names in the JSON snapshot
/// are camelCase (`lastProcessedTweetId`, ...); missing fields fall back to
/// their defaults so old snapshots keep loading.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct BotState {
    /// Id of the newest mention seen so far, used as the `since_id` cursor
    /// for the next search. Empty until the first mention is seen.
    pub last_processed_tweet_id: String,
    /// Epoch millis of the last successful save.
    pub last_activity_timestamp: i64,
    /// Recently handled mention ids, insertion order. Capped on save; old
    /// ids age out, so this is a recency window, not a full dedup history.
    pub processed_tweets: Vec<String>,
    /// Incremented on every process start.
    pub startup_count: u32,
}

/// One mention of the bot, as normalized from either search API.
#[derive(Debug, Clone)]
pub struct MentionRecord {
    pub id: String,
    pub text: String,
    pub author_id: String,
    pub author_handle: String,
    pub created_at: Option<String>,
}

/// A parsed token creation request. The symbol is passed through as
/// written; the launchpad frontend upper-cases it and caps it at 10
/// characters before minting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateCommand {
    pub token_name: String,
    pub token_symbol: String,
}

/// The account the feed credentials belong to.
#[derive(Debug, Clone)]
pub struct BotIdentity {
    pub id: String,
    pub handle: String,
}
