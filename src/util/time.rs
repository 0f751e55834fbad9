use chrono::{DateTime, Utc};
use std::time::Duration;

pub type Timestamp = DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}

/// Absolute distance between two instants, saturating on overflow.
pub fn distance(a: Timestamp, b: Timestamp) -> Duration {
    let delta = if a >= b { a - b } else { b - a };
    delta.to_std().unwrap_or(Duration::MAX)
}
