pub mod node;
pub mod node_registry;

pub use node::{AliveState, Node, NodeView};
pub use node_registry::NodeRegistry;
