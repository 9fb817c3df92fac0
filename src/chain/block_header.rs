use super::types::{BlockHash, TxHash};

use crate::Result;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// The hash of the header this one extends
    previous: BlockHash,
    /// Must be able to prove that transactions were included in the block
    merkle_root: TxHash,
    /// Milliseconds since the unix epoch at production time
    timestamp: u64,
    nonce: u64,
}

impl std::fmt::Display for BlockHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut s = format!("previous = {}\n", hex::encode(self.previous));
        s = format!("{}merkle_root = {}\n", s, hex::encode(self.merkle_root));
        s = format!("{}timestamp = {:?}", s, self.timestamp);
        write!(f, "{}\n", s)
    }
}

impl BlockHeader {
    pub fn new(previous: BlockHash, merkle_root: TxHash, timestamp: u64, nonce: u64) -> BlockHeader {
        BlockHeader { previous, merkle_root, timestamp, nonce }
    }

    pub fn previous(&self) -> BlockHash {
        self.previous
    }

    // FIXME: Assumption: blake3 produces a big-endian hash
    pub fn hash(&self) -> Result<BlockHash> {
        let encoded = bincode::serialize(self)?;
        Ok(blake3::hash(&encoded).as_bytes().clone())
    }
}
