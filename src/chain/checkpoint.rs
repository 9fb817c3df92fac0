use super::types::{BlockHash, BlockHeight};

use crate::{Error, Result};

/// A hard-coded `(height, hash)` anchor used to reject chains which diverge
/// from well-known history.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    height: BlockHeight,
    hash: BlockHash,
}

impl Checkpoint {
    pub fn new(height: BlockHeight, hash: BlockHash) -> Checkpoint {
        Checkpoint { height, hash }
    }

    pub fn height(&self) -> BlockHeight {
        self.height
    }

    pub fn hash(&self) -> BlockHash {
        self.hash
    }
}

impl std::fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.height, hex::encode(self.hash))
    }
}

/// The ascending-by-height ordering of a finite set of checkpoints.
#[derive(Debug, Clone)]
pub struct CheckpointSet {
    checkpoints: Vec<Checkpoint>,
}

impl CheckpointSet {
    /// Sorts the supplied checkpoints by height. Duplicate heights are
    /// rejected outright since two anchors at one height can never both hold.
    pub fn new(mut checkpoints: Vec<Checkpoint>) -> Result<CheckpointSet> {
        checkpoints.sort_by_key(|checkpoint| checkpoint.height());
        for pair in checkpoints.windows(2) {
            if pair[0].height() == pair[1].height() {
                return Err(Error::DuplicateCheckpoint);
            }
        }
        Ok(CheckpointSet { checkpoints })
    }

    pub fn empty() -> CheckpointSet {
        CheckpointSet { checkpoints: vec![] }
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    /// The checkpoint match predicate. Heights without a checkpoint are
    /// unchecked and always pass.
    pub fn validate(&self, hash: &BlockHash, height: BlockHeight) -> bool {
        match self.checkpoints.binary_search_by_key(&height, |checkpoint| checkpoint.height()) {
            Ok(i) => self.checkpoints[i].hash() == *hash,
            Err(_) => true,
        }
    }

    /// The highest checkpointed height, used to compute the sync target.
    pub fn back_height(&self) -> Option<BlockHeight> {
        self.checkpoints.last().map(|checkpoint| checkpoint.height())
    }

    /// Iterate from the highest checkpoint down to the lowest.
    pub fn iter_descending(&self) -> impl Iterator<Item = &Checkpoint> {
        self.checkpoints.iter().rev()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn hash(byte: u8) -> BlockHash {
        [byte; 32]
    }

    #[actix_rt::test]
    async fn test_sorts_by_height() {
        let checkpoints = CheckpointSet::new(vec![
            Checkpoint::new(4000, hash(3)),
            Checkpoint::new(100, hash(1)),
            Checkpoint::new(2000, hash(2)),
        ])
        .unwrap();

        assert_eq!(checkpoints.back_height(), Some(4000));
        let descending: Vec<u64> =
            checkpoints.iter_descending().map(|checkpoint| checkpoint.height()).collect();
        assert_eq!(descending, vec![4000, 2000, 100]);
    }

    #[actix_rt::test]
    async fn test_rejects_duplicate_heights() {
        let result = CheckpointSet::new(vec![
            Checkpoint::new(100, hash(1)),
            Checkpoint::new(100, hash(2)),
        ]);
        assert!(matches!(result, Err(crate::Error::DuplicateCheckpoint)));
    }

    #[actix_rt::test]
    async fn test_validate() {
        let checkpoints = CheckpointSet::new(vec![Checkpoint::new(100, hash(1))]).unwrap();

        // A matching anchor passes
        assert!(checkpoints.validate(&hash(1), 100));
        // A conflicting anchor fails
        assert!(!checkpoints.validate(&hash(2), 100));
        // Unchecked heights always pass
        assert!(checkpoints.validate(&hash(2), 99));
        assert!(checkpoints.validate(&hash(2), 101));
    }

    #[actix_rt::test]
    async fn test_empty_set_validates_everything() {
        let checkpoints = CheckpointSet::empty();
        assert_eq!(checkpoints.back_height(), None);
        assert!(checkpoints.validate(&hash(7), 0));
        assert!(checkpoints.validate(&hash(7), u64::MAX));
    }
}
