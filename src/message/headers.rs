//! Header sync message definitions.
use crate::chain::types::BlockHash;
use crate::chain::BlockHeader;

/// A `headers` response never carries more than this many elements; a
/// response of exactly this size signals that more headers are available.
pub const FULL_HEADERS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetHeaders {
    /// Known-chain hashes allowing the peer to locate the common ancestor.
    /// During initial sync this is exactly the current tip.
    pub locator: Vec<BlockHash>,
    /// Hash to stop at, or the all-zero hash for "as many as you have".
    pub stop: BlockHash,
}

impl GetHeaders {
    pub fn new(locator: Vec<BlockHash>, stop: BlockHash) -> Self {
        GetHeaders { locator, stop }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headers {
    pub elements: Vec<BlockHeader>,
}

impl Headers {
    pub fn new(elements: Vec<BlockHeader>) -> Self {
        Headers { elements }
    }
}
