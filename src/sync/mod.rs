//! Initial block download.
//!
//! Synchronisation runs in two phases. The header phase extends a
//! [HashChain](crate::chain::HashChain) of header hashes from the resume
//! anchor up to the highest checkpoint, one serial peer channel at a time,
//! until a quorum of peers has replayed the sequence successfully. The block
//! phase then downloads the block bodies for the accumulated hashes in order.
//!
//! Each phase pairs a per-channel protocol actor with a session actor. The
//! session owns the peer rotation and the quorum count; the protocol owns the
//! chain for the lifetime of its channel and enforces the rate floor.
pub mod block_session;
pub mod block_sync;
pub mod header_session;
pub mod header_sync;

pub use block_session::BlockSyncSession;
pub use block_sync::BlockSync;
pub use header_session::HeaderSyncSession;
pub use header_sync::HeaderSync;

use tokio::time::Duration;

/// Settings shared by the sync sessions.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Successful peer syncs required before a session reports success.
    pub quorum: u32,
    /// Rate floor for the header phase.
    pub headers_per_second: u32,
    /// Rate floor for the block phase.
    pub blocks_per_minute: u32,
    /// Patience for establishing a connection and for the version handshake.
    pub connect_timeout: Duration,
    /// Interval between keep-alive pings on an attached channel.
    pub keep_alive_period: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            quorum: 3,
            headers_per_second: 100,
            blocks_per_minute: 60,
            connect_timeout: Duration::from_secs(5),
            keep_alive_period: Duration::from_secs(30),
        }
    }
}
