//! Chain data structures used by the sync protocols.
pub mod block_header;
pub mod checkpoint;
pub mod hash_chain;
pub mod types;

pub use block_header::BlockHeader;
pub use checkpoint::{Checkpoint, CheckpointSet};
pub use hash_chain::HashChain;
