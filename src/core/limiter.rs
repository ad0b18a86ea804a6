use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

const WINDOW: Duration = Duration::from_secs(15 * 60);
const MIN_REQUEST_GAP: Duration = Duration::from_secs(5);
const RESET_BUFFER: Duration = Duration::from_secs(5);
const REMOTE_COOLDOWN: Duration = Duration::from_secs(15 * 60);
const MAX_RETRIES: u32 = 3;

/// Time source for the limiter, injectable so tests can run on a fake clock.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestClass {
    Search,
    Post,
}

impl RequestClass {
    fn ceiling(self) -> u32 {
        match self {
            RequestClass::Search => 5,
            RequestClass::Post => 10,
        }
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestClass::Search => write!(f, "search"),
            RequestClass::Post => write!(f, "post"),
        }
    }
}

#[derive(Default)]
struct ClassWindow {
    window_reset_at: Option<Instant>,
    request_count: u32,
    last_request: Option<Instant>,
    cooldown_until: Option<Instant>,
}

/// Fixed-window limiter for outbound API calls, one window per request class.
pub struct RateLimiter {
    clock: Box<dyn Clock>,
    search: ClassWindow,
    post: ClassWindow,
}

impl RateLimiter {
    pub fn new(clock: Box<dyn Clock>) -> Self {
        RateLimiter {
            clock,
            search: ClassWindow::default(),
            post: ClassWindow::default(),
        }
    }

    /// Reserve one request slot. Waits out short gaps and full windows,
    /// but gives up after a bounded number of window waits or while a
    /// remote cooldown is active.
    pub async fn acquire(&mut self, class: RequestClass) -> bool {
        let Self { clock, search, post } = self;
        let window = match class {
            RequestClass::Search => search,
            RequestClass::Post => post,
        };

        if let Some(until) = window.cooldown_until {
            if clock.now() < until {
                warn!("Skipping {} request, cooling down after a remote rate limit", class);
                return false;
            }
            window.cooldown_until = None;
        }

        let mut retries = MAX_RETRIES;
        loop {
            let now = clock.now();
            let reset_at = match window.window_reset_at {
                Some(reset_at) if now < reset_at => reset_at,
                _ => {
                    let reset_at = now + WINDOW;
                    window.window_reset_at = Some(reset_at);
                    window.request_count = 0;
                    reset_at
                }
            };

            if window.request_count < class.ceiling() {
                if let Some(last) = window.last_request {
                    let since = now.duration_since(last);
                    if since < MIN_REQUEST_GAP {
                        let wait = MIN_REQUEST_GAP - since;
                        info!("Throttling {} request, waiting {}ms", class, wait.as_millis());
                        clock.sleep(wait).await;
                    }
                }
                window.last_request = Some(clock.now());
                window.request_count += 1;
                return true;
            }

            let wait = reset_at.duration_since(now) + RESET_BUFFER;
            warn!(
                "Rate limit reached for {}, waiting {}s for the window to reset",
                class,
                wait.as_secs()
            );
            if retries == 0 {
                warn!("Maximum retries reached for {}, skipping request", class);
                return false;
            }
            retries -= 1;
            clock.sleep(wait).await;
        }
    }

    /// Record a 429 from the API itself. Requests in this class are refused
    /// without waiting until the cooldown lapses.
    pub fn note_remote_limit(&mut self, class: RequestClass) {
        let until = self.clock.now() + REMOTE_COOLDOWN;
        let window = match class {
            RequestClass::Search => &mut self.search,
            RequestClass::Post => &mut self.post,
        };
        window.cooldown_until = Some(until);
        warn!("Remote rate limit hit for {}, backing off for {}s", class, REMOTE_COOLDOWN.as_secs());
    }
}
