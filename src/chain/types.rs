// Blocks
pub type BlockHash = [u8; 32];
pub type BlockHeight = u64;

// Transactions
pub type TxHash = [u8; 32];

/// The all-zero hash, used as the `stop` hash meaning "no upper bound".
pub const NULL_HASH: BlockHash = [0u8; 32];
