use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use crate::models::BotState;

/// Keep the processed-id list from growing without bound: once it passes
/// PROCESSED_CAP entries, a save keeps only the most recent PROCESSED_KEEP.
const PROCESSED_CAP: usize = 100;
const PROCESSED_KEEP: usize = 50;

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub const DEFAULT_PATH: &'static str = "./storage/bot_state.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    /// Load the saved state, falling back to defaults on a missing or
    /// unreadable file. Always bumps the startup counter.
    pub fn load(&self) -> BotState {
        let mut state = match fs::read_to_string(&self.path) {
            Ok(data) => match serde_json::from_str::<BotState>(&data) {
                Ok(state) => {
                    info!(
                        "Loaded saved state with last tweet id: {}",
                        if state.last_processed_tweet_id.is_empty() {
                            "<none>"
                        } else {
                            &state.last_processed_tweet_id
                        }
                    );
                    state
                }
                Err(e) => {
                    warn!("Error parsing saved state, using defaults: {}", e);
                    BotState::default()
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => BotState::default(),
            Err(e) => {
                warn!("Error loading state, using defaults: {}", e);
                BotState::default()
            }
        };
        state.startup_count += 1;
        state
    }

    /// Write the state back to disk, trimming the processed-id list and
    /// refreshing the activity timestamp first.
    pub fn save(&self, state: &mut BotState) -> Result<(), anyhow::Error> {
        state.last_activity_timestamp = Utc::now().timestamp_millis();

        if state.processed_tweets.len() > PROCESSED_CAP {
            let drop_count = state.processed_tweets.len() - PROCESSED_KEEP;
            state.processed_tweets.drain(..drop_count);
        }

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let data = serde_json::to_string_pretty(state)?;
        fs::write(&self.path, data)?;
        Ok(())
    }
}
