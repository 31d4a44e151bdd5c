//! Per-account admission control for payment-intent creation.
//!
//! A fixed-window counter keyed by account identity (not network address). This bounds abusive repeated intent
//! creation; it is not a correctness mechanism.
use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use log::debug;

struct Window {
    started: Instant,
    count: u32,
}

pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    hits: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self { max_per_window, window, hits: Mutex::new(HashMap::new()) }
    }

    /// Records a hit for `key` and returns whether the request is allowed.
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().expect("rate limiter lock poisoned");
        // stale entries pile up over time; drop them when the map gets large
        if hits.len() > 10_000 {
            let window = self.window;
            hits.retain(|_, w| now.duration_since(w.started) < window);
        }
        let entry = hits.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count += 1;
        let allowed = entry.count <= self.max_per_window;
        if !allowed {
            debug!("💻️ Rate limit hit for {key}: {} requests in the current window", entry.count);
        }
        allowed
    }
}
