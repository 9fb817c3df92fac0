//! The network version message definition.
use crate::chain::types::BlockHeight;
use crate::version::CURRENT_VERSION;

use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub version: u32,
    pub ip: SocketAddr,
    /// The height of the best chain known to the sender.
    pub start_height: BlockHeight,
}

impl Version {
    pub fn new(ip: SocketAddr, start_height: BlockHeight) -> Self {
        Version { version: CURRENT_VERSION, ip, start_height }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionAck {
    pub version: u32,
    pub ip: SocketAddr,
    pub start_height: BlockHeight,
}

impl VersionAck {
    pub fn new(ip: SocketAddr, start_height: BlockHeight) -> Self {
        VersionAck { version: CURRENT_VERSION, ip, start_height }
    }
}
