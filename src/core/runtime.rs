use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::commands::CommandParser;
use crate::core::limiter::{RateLimiter, RequestClass};
use crate::models::{BotState, CreateCommand, MentionRecord};
use crate::providers::launchpad::TokenMinter;
use crate::providers::privy::IdentityVerifier;
use crate::providers::twitter::{FeedApi, FeedError};
use crate::state::StateStore;

const EXPLORER_TX_URL: &str = "https://explorer.sepolia.mantle.xyz/tx";

// Persist after every third mention so a crash mid-batch loses little.
const SAVE_STRIDE: usize = 3;

pub struct RuntimeSettings {
    pub app_url: String,
    pub poll_interval: Duration,
    pub startup_delay: Duration,
    pub mention_gap: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        RuntimeSettings {
            app_url: "https://meme-launchpad.vercel.app".to_string(),
            poll_interval: Duration::from_secs(15 * 60),
            startup_delay: Duration::from_secs(30),
            mention_gap: Duration::from_secs(2),
        }
    }
}

pub struct Runtime {
    feed: Box<dyn FeedApi>,
    verifier: Box<dyn IdentityVerifier>,
    minter: Box<dyn TokenMinter>,
    limiter: RateLimiter,
    store: StateStore,
    state: BotState,
    parser: CommandParser,
    settings: RuntimeSettings,
}

impl Runtime {
    pub fn new(
        feed: Box<dyn FeedApi>,
        verifier: Box<dyn IdentityVerifier>,
        minter: Box<dyn TokenMinter>,
        limiter: RateLimiter,
        store: StateStore,
        settings: RuntimeSettings,
    ) -> Self {
        let state = store.load();
        Runtime {
            feed,
            verifier,
            minter,
            limiter,
            store,
            state,
            parser: CommandParser::new(),
            settings,
        }
    }

    pub async fn run(&mut self) -> Result<(), anyhow::Error> {
        info!("=== Starting Launchpad Mention Bot ===");
        info!("Startup number: {}", self.state.startup_count);
        if self.state.last_processed_tweet_id.is_empty() {
            info!("No saved cursor, starting from current mentions");
        } else {
            info!("Resuming after tweet {}", self.state.last_processed_tweet_id);
        }
        info!("Relayer address: {}", self.minter.relayer_address());
        info!("======================");

        match self.feed.verify_credentials().await {
            Ok(identity) => info!("Twitter credentials verified, connected as @{}", identity.handle),
            Err(e) => warn!("Could not verify Twitter credentials, continuing anyway: {}", e),
        }

        match self.minter.setup_authority().await {
            Ok(()) => {}
            Err(e) if e.to_string().contains("Not owner") => {
                info!("Bot authority is managed by the contract owner, skipping setup");
            }
            Err(e) => error!("Error setting bot authority: {}", e),
        }

        let shutdown = shutdown_signal();
        tokio::pin!(shutdown);

        info!("First poll in {}s", self.settings.startup_delay.as_secs());
        tokio::select! {
            _ = &mut shutdown => {
                self.persist();
                info!("Shutting down");
                return Ok(());
            }
            _ = sleep(self.settings.startup_delay) => {}
        }

        loop {
            if let Err(e) = self.poll_cycle().await {
                error!("Error processing mentions: {}", e);
            }
            self.persist();

            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(self.settings.poll_interval) => {}
            }
        }

        self.persist();
        info!("Shutting down");
        Ok(())
    }

    /// One full pass: fetch new mentions, advance the cursor, then handle
    /// each mention that has not been seen before.
    async fn poll_cycle(&mut self) -> Result<(), anyhow::Error> {
        let mentions = self.fetch_mentions().await?;
        if mentions.is_empty() {
            info!("No new mentions found");
            return Ok(());
        }
        info!("Found {} new mentions", mentions.len());

        // Mentions arrive newest first, so the head is the new cursor.
        // Persist it before handling anything: a crash mid-batch must not
        // replay the whole batch on restart.
        let newest_id = mentions[0].id.clone();
        if self.state.last_processed_tweet_id != newest_id {
            self.state.last_processed_tweet_id = newest_id;
            self.persist();
        }

        for (index, mention) in mentions.iter().enumerate() {
            if self.state.processed_tweets.iter().any(|id| id == &mention.id) {
                info!("Skipping already processed tweet {}", mention.id);
                continue;
            }

            if index > 0 && !self.settings.mention_gap.is_zero() {
                sleep(self.settings.mention_gap).await;
            }

            self.handle_mention(mention).await;
            self.state.processed_tweets.push(mention.id.clone());

            if (index + 1) % SAVE_STRIDE == 0 {
                self.persist();
            }
        }
        self.persist();
        Ok(())
    }

    async fn fetch_mentions(&mut self) -> Result<Vec<MentionRecord>, anyhow::Error> {
        let since_id = (!self.state.last_processed_tweet_id.is_empty())
            .then(|| self.state.last_processed_tweet_id.clone());

        if !self.limiter.acquire(RequestClass::Search).await {
            info!("Search budget exhausted, skipping this cycle");
            return Ok(Vec::new());
        }

        match self.feed.search_recent(since_id.as_deref()).await {
            Ok(mentions) => Ok(mentions),
            Err(FeedError::RateLimited) => {
                warn!("Mention search was rate limited");
                self.limiter.note_remote_limit(RequestClass::Search);
                self.fetch_mentions_legacy(since_id.as_deref()).await
            }
            Err(FeedError::Unavailable(status)) => {
                warn!("Mention search returned {}, falling back to the legacy endpoint", status);
                self.fetch_mentions_legacy(since_id.as_deref()).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch_mentions_legacy(
        &mut self,
        since_id: Option<&str>,
    ) -> Result<Vec<MentionRecord>, anyhow::Error> {
        if !self.limiter.acquire(RequestClass::Search).await {
            info!("Search budget exhausted, skipping the legacy fallback");
            return Ok(Vec::new());
        }

        match self.feed.search_legacy(since_id).await {
            Ok(mentions) => {
                info!("Legacy search returned {} mentions", mentions.len());
                Ok(mentions)
            }
            Err(FeedError::RateLimited) => {
                warn!("Legacy search was rate limited too, giving up on this cycle");
                self.limiter.note_remote_limit(RequestClass::Search);
                Ok(Vec::new())
            }
            Err(e) => {
                warn!("Legacy search failed: {}", e);
                Ok(Vec::new())
            }
        }
    }

    async fn handle_mention(&mut self, mention: &MentionRecord) {
        info!(
            "Processing mention {} from @{}: {}",
            mention.id, mention.author_handle, mention.text
        );

        let command = match self.parser.parse(&mention.text) {
            Some(command) => command,
            None => {
                info!("Not a token creation command, skipping");
                return;
            }
        };

        if !self.verifier.verify(&mention.author_handle).await {
            let message = format!(
                "Before creating tokens, please connect your Twitter account on our platform first.\nConnect here: {}",
                self.settings.app_url
            );
            self.send_reply(&mention.id, &message).await;
            return;
        }
        info!("@{} is verified on the launchpad", mention.author_handle);

        let CreateCommand { token_name, token_symbol } = command;
        info!(
            "Creating token {} ({}) for @{}",
            token_name, token_symbol, mention.author_handle
        );

        let creator = self.minter.relayer_address();
        match self.minter.mint(&creator, &token_name, &token_symbol).await {
            Ok(tx_hash) => {
                let message = format!(
                    "Successfully created {} ({}) token on Mantle!\nTransaction: {}/{}",
                    token_name, token_symbol, EXPLORER_TX_URL, tx_hash
                );
                self.send_reply(&mention.id, &message).await;
            }
            Err(e) => {
                error!("Error creating token: {}", e);
                let message = format!("Sorry, there was an error processing your request: {}", e);
                self.send_reply(&mention.id, &message).await;
            }
        }
    }

    /// Reply through the v2 endpoint, with one legacy attempt if it fails.
    /// Replies are best effort and never abort the mention.
    async fn send_reply(&mut self, target_id: &str, message: &str) {
        if !self.limiter.acquire(RequestClass::Post).await {
            info!("Post budget exhausted, skipping reply to {}", target_id);
            return;
        }

        match self.feed.post_reply(target_id, message).await {
            Ok(()) => {
                info!("Replied to tweet {}", target_id);
                return;
            }
            Err(e) => {
                warn!("Error sending reply to {}: {}", target_id, e);
                if matches!(e, FeedError::RateLimited) {
                    self.limiter.note_remote_limit(RequestClass::Post);
                }
            }
        }

        if !self.limiter.acquire(RequestClass::Post).await {
            info!("Post budget exhausted, skipping the legacy reply to {}", target_id);
            return;
        }
        match self.feed.post_reply_legacy(target_id, message).await {
            Ok(()) => info!("Replied to tweet {} via the legacy endpoint", target_id),
            Err(e) => {
                error!("Legacy reply to {} failed: {}", target_id, e);
                if matches!(e, FeedError::RateLimited) {
                    self.limiter.note_remote_limit(RequestClass::Post);
                }
            }
        }
    }

    fn persist(&mut self) {
        if let Err(e) = self.store.save(&mut self.state) {
            warn!("Error saving bot state: {}", e);
        }
    }
}

/// Resolves on ctrl-c or SIGTERM, whichever lands first.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("ctrl-c handler should install");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler should install")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::limiter::testing::FakeClock;
    use crate::models::BotIdentity;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct FakeFeed {
        batches: Arc<Mutex<Vec<Vec<MentionRecord>>>>,
        since_seen: Arc<Mutex<Vec<Option<String>>>>,
        replies: Arc<Mutex<Vec<(String, String)>>>,
        legacy_replies: Arc<Mutex<Vec<(String, String)>>>,
        fail_primary_reply: bool,
    }

    impl FakeFeed {
        fn with_batches(batches: Vec<Vec<MentionRecord>>) -> Self {
            FakeFeed {
                batches: Arc::new(Mutex::new(batches)),
                ..FakeFeed::default()
            }
        }
    }

    #[async_trait]
    impl FeedApi for FakeFeed {
        async fn verify_credentials(&self) -> Result<BotIdentity, FeedError> {
            Ok(BotIdentity {
                id: "1".to_string(),
                handle: "launchbot".to_string(),
            })
        }

        async fn search_recent(&self, since_id: Option<&str>) -> Result<Vec<MentionRecord>, FeedError> {
            self.since_seen.lock().unwrap().push(since_id.map(str::to_string));
            let mut batches = self.batches.lock().unwrap();
            if batches.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(batches.remove(0))
            }
        }

        async fn search_legacy(&self, _since_id: Option<&str>) -> Result<Vec<MentionRecord>, FeedError> {
            Ok(Vec::new())
        }

        async fn post_reply(&self, target_id: &str, message: &str) -> Result<(), FeedError> {
            if self.fail_primary_reply {
                return Err(FeedError::Transport("connection reset".to_string()));
            }
            self.replies
                .lock()
                .unwrap()
                .push((target_id.to_string(), message.to_string()));
            Ok(())
        }

        async fn post_reply_legacy(&self, target_id: &str, message: &str) -> Result<(), FeedError> {
            self.legacy_replies
                .lock()
                .unwrap()
                .push((target_id.to_string(), message.to_string()));
            Ok(())
        }
    }

    #[derive(Clone)]
    struct FakeVerifier {
        verified: bool,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl FakeVerifier {
        fn new(verified: bool) -> Self {
            FakeVerifier {
                verified,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl IdentityVerifier for FakeVerifier {
        async fn verify(&self, handle: &str) -> bool {
            self.seen.lock().unwrap().push(handle.to_string());
            self.verified
        }
    }

    #[derive(Clone, Default)]
    struct FakeMinter {
        minted: Arc<Mutex<Vec<(String, String)>>>,
        fail: bool,
    }

    #[async_trait]
    impl TokenMinter for FakeMinter {
        async fn mint(&self, _creator: &str, name: &str, symbol: &str) -> Result<String, anyhow::Error> {
            if self.fail {
                anyhow::bail!("execution reverted");
            }
            self.minted
                .lock()
                .unwrap()
                .push((name.to_string(), symbol.to_string()));
            Ok("0xabc123".to_string())
        }

        async fn setup_authority(&self) -> Result<(), anyhow::Error> {
            Ok(())
        }

        fn relayer_address(&self) -> String {
            "0x00000000000000000000000000000000000000aa".to_string()
        }
    }

    fn mention(id: &str, text: &str) -> MentionRecord {
        MentionRecord {
            id: id.to_string(),
            text: text.to_string(),
            author_id: "9001".to_string(),
            author_handle: "degen_dave".to_string(),
            created_at: None,
        }
    }

    fn test_runtime(
        dir: &tempfile::TempDir,
        feed: FakeFeed,
        verifier: FakeVerifier,
        minter: FakeMinter,
    ) -> Runtime {
        let settings = RuntimeSettings {
            mention_gap: Duration::ZERO,
            ..RuntimeSettings::default()
        };
        Runtime::new(
            Box::new(feed),
            Box::new(verifier),
            Box::new(minter),
            RateLimiter::new(Box::new(FakeClock::new(true))),
            StateStore::new(dir.path().join("bot_state.json")),
            settings,
        )
    }

    #[tokio::test]
    async fn batch_is_processed_newest_cursor_first() {
        let dir = tempfile::tempdir().unwrap();

        // Seed a saved cursor so the next search asks for newer tweets only.
        let store = StateStore::new(dir.path().join("bot_state.json"));
        let mut seeded = BotState {
            last_processed_tweet_id: "100".to_string(),
            ..BotState::default()
        };
        store.save(&mut seeded).unwrap();

        let feed = FakeFeed::with_batches(vec![vec![
            mention("103", "@launchbot create GammaCoin GAMMA"),
            mention("102", "@launchbot create BetaCoin BETA"),
            mention("101", "@launchbot create AlphaCoin ALPHA"),
        ]]);
        let minter = FakeMinter::default();
        let mut runtime = test_runtime(&dir, feed.clone(), FakeVerifier::new(true), minter.clone());

        runtime.poll_cycle().await.unwrap();

        assert_eq!(feed.since_seen.lock().unwrap().as_slice(), &[Some("100".to_string())]);
        assert_eq!(runtime.state.last_processed_tweet_id, "103");
        for id in ["101", "102", "103"] {
            assert!(runtime.state.processed_tweets.iter().any(|seen| seen == id));
        }
        assert_eq!(minter.minted.lock().unwrap().len(), 3);
        assert_eq!(feed.replies.lock().unwrap().len(), 3);

        // The new cursor survives a restart.
        let reloaded = StateStore::new(dir.path().join("bot_state.json")).load();
        assert_eq!(reloaded.last_processed_tweet_id, "103");
    }

    #[tokio::test]
    async fn replayed_mention_is_handled_once() {
        let dir = tempfile::tempdir().unwrap();
        let batch = vec![mention("7", "@launchbot create FooCoin FOO")];
        let feed = FakeFeed::with_batches(vec![batch.clone(), batch]);
        let minter = FakeMinter::default();
        let mut runtime = test_runtime(&dir, feed.clone(), FakeVerifier::new(true), minter.clone());

        runtime.poll_cycle().await.unwrap();
        runtime.poll_cycle().await.unwrap();

        assert_eq!(minter.minted.lock().unwrap().len(), 1);
        assert_eq!(feed.replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn chatter_is_marked_processed_without_replying() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FakeFeed::with_batches(vec![vec![mention("8", "@launchbot hello there")]]);
        let minter = FakeMinter::default();
        let verifier = FakeVerifier::new(true);
        let mut runtime = test_runtime(&dir, feed.clone(), verifier.clone(), minter.clone());

        runtime.poll_cycle().await.unwrap();

        assert!(minter.minted.lock().unwrap().is_empty());
        assert!(feed.replies.lock().unwrap().is_empty());
        assert!(verifier.seen.lock().unwrap().is_empty());
        assert!(runtime.state.processed_tweets.iter().any(|id| id == "8"));
    }

    #[tokio::test]
    async fn unverified_author_gets_a_connection_prompt_and_no_token() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FakeFeed::with_batches(vec![vec![mention("9", "@launchbot create FooCoin FOO")]]);
        let minter = FakeMinter::default();
        let mut runtime = test_runtime(&dir, feed.clone(), FakeVerifier::new(false), minter.clone());

        runtime.poll_cycle().await.unwrap();

        assert!(minter.minted.lock().unwrap().is_empty());
        let replies = feed.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].0, "9");
        assert!(replies[0].1.contains("https://meme-launchpad.vercel.app"));
        assert!(runtime.state.processed_tweets.iter().any(|id| id == "9"));
    }

    #[tokio::test]
    async fn mint_failure_still_replies_and_marks_processed() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FakeFeed::with_batches(vec![vec![mention("10", "@launchbot create FooCoin FOO")]]);
        let minter = FakeMinter {
            fail: true,
            ..FakeMinter::default()
        };
        let mut runtime = test_runtime(&dir, feed.clone(), FakeVerifier::new(true), minter);

        runtime.poll_cycle().await.unwrap();

        let replies = feed.replies.lock().unwrap();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].1.starts_with("Sorry, there was an error processing your request"));
        assert!(runtime.state.processed_tweets.iter().any(|id| id == "10"));
    }

    #[tokio::test]
    async fn failed_primary_reply_falls_back_to_legacy_once() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FakeFeed {
            fail_primary_reply: true,
            ..FakeFeed::default()
        };
        feed.batches
            .lock()
            .unwrap()
            .push(vec![mention("11", "@launchbot create FooCoin FOO")]);
        let mut runtime = test_runtime(&dir, feed.clone(), FakeVerifier::new(true), FakeMinter::default());

        runtime.poll_cycle().await.unwrap();

        assert!(feed.replies.lock().unwrap().is_empty());
        assert_eq!(feed.legacy_replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn post_cooldown_suppresses_all_reply_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let feed = FakeFeed::with_batches(vec![vec![mention("12", "@launchbot create FooCoin FOO")]]);
        let minter = FakeMinter::default();
        let mut runtime = test_runtime(&dir, feed.clone(), FakeVerifier::new(true), minter.clone());

        runtime.limiter.note_remote_limit(RequestClass::Post);
        runtime.poll_cycle().await.unwrap();

        // The token is still minted, only the reply is suppressed.
        assert_eq!(minter.minted.lock().unwrap().len(), 1);
        assert!(feed.replies.lock().unwrap().is_empty());
        assert!(feed.legacy_replies.lock().unwrap().is_empty());
    }
}
