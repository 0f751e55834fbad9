pub mod actor;
pub mod liveness;

pub use actor::{FailureDetector, Listeners, PingRound};
pub use liveness::{LivenessTracker, Transition};
