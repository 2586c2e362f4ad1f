// Feedback Aggregator: write path and the deduplicated public feed.

pub mod handlers;
pub mod service;
