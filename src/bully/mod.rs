pub mod actor;
pub mod election;
pub mod history;
pub mod rpc;
pub mod state;
pub mod types;

pub use actor::{BullyActor, ElectionStateInfo};
pub use history::ElectionLog;
pub use state::{ElectionState, Role};
pub use types::{ElectionEvent, ElectionEventType, NodeId, Round};
