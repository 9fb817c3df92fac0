use super::checkpoint::CheckpointSet;
use super::types::{BlockHash, BlockHeight};

use crate::{Error, Result};

/// The running chain of header hashes accumulated during header sync.
///
/// The chain is seeded with at least one hash, the resume anchor, whose block
/// height is `first_height`. The logical height of element `i` is
/// `first_height + i`. The chain is append-only except for [rollback](HashChain::rollback).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HashChain {
    hashes: Vec<BlockHash>,
    first_height: BlockHeight,
}

impl HashChain {
    pub fn new(anchor: BlockHash, first_height: BlockHeight) -> HashChain {
        HashChain { hashes: vec![anchor], first_height }
    }

    /// Seed the chain from an existing hash list, e.g. a previously synced
    /// prefix. The list must contain the resume anchor.
    pub fn from_hashes(hashes: Vec<BlockHash>, first_height: BlockHeight) -> Result<HashChain> {
        if hashes.is_empty() {
            return Err(Error::EmptyChain);
        }
        Ok(HashChain { hashes, first_height })
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn first_height(&self) -> BlockHeight {
        self.first_height
    }

    /// The height one past the last element.
    pub fn next_height(&self) -> BlockHeight {
        self.first_height + self.hashes.len() as u64
    }

    pub fn tip(&self) -> BlockHash {
        // The chain is never empty
        self.hashes.last().unwrap().clone()
    }

    pub fn push(&mut self, hash: BlockHash) {
        self.hashes.push(hash);
    }

    pub fn hashes(&self) -> &[BlockHash] {
        &self.hashes
    }

    /// Re-anchor the chain after a rejected merge.
    ///
    /// Scans the checkpoints from highest to lowest height and truncates the
    /// chain so that the first checkpoint hash found in it becomes the last
    /// element. When no checkpoint hash occurs in the chain, truncates to the
    /// resume anchor alone, since nothing beyond it has been attested by an
    /// honest peer.
    pub fn rollback(&mut self, checkpoints: &CheckpointSet) {
        for checkpoint in checkpoints.iter_descending() {
            if let Some(i) = self.hashes.iter().position(|hash| *hash == checkpoint.hash()) {
                self.hashes.truncate(i + 1);
                return;
            }
        }
        self.hashes.truncate(1);
    }
}
