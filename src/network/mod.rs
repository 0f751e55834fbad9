pub mod http;
pub mod memory;
pub mod transport;

pub use http::{HttpTransport, FORWARDED_BY_HEADER};
pub use memory::{MemoryNetwork, MemoryPeer, MemoryTransport};
pub use transport::PeerTransport;
