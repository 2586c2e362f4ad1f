//! Per-invocation uniqueness tokens used to namespace generated HTML.
//!
//! The prompt compiler takes the token as a plain argument; the orchestrator
//! draws it from an injected `TokenSource` so tests can pin it.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> u64;
}

/// Millisecond wall-clock tokens, bumped past the previous value when two
/// calls land in the same millisecond, so tokens never repeat in a process.
#[derive(Debug, Default)]
pub struct ClockTokens {
    last: AtomicU64,
}

impl ClockTokens {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenSource for ClockTokens {
    fn next_token(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let next = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => prev = actual,
            }
        }
    }
}
