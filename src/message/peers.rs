//! Address exchange message definitions.
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetPeers;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peers {
    pub addresses: Vec<SocketAddr>,
}

impl Peers {
    pub fn new(addresses: Vec<SocketAddr>) -> Self {
        Peers { addresses }
    }
}
