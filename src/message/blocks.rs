//! Block sync message definitions.
use crate::chain::types::{BlockHash, TxHash};
use crate::chain::BlockHeader;
use crate::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetBlocks {
    /// The header hashes of the requested block bodies, in chain order.
    pub hashes: Vec<BlockHash>,
}

impl GetBlocks {
    pub fn new(hashes: Vec<BlockHash>) -> Self {
        GetBlocks { hashes }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    /// The transactions committed to by `header.merkle_root`.
    pub transactions: Vec<TxHash>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<TxHash>) -> Self {
        Block { header, transactions }
    }

    pub fn hash(&self) -> Result<BlockHash> {
        self.header.hash()
    }
}
