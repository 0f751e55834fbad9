pub mod bus;

pub use bus::{AdminUpdate, Channel, EventBus, Subscription, Topic};
