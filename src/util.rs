//! Utility functions for configuration parsing.
use std::net::{SocketAddr, ToSocketAddrs};

use crate::chain::types::BlockHash;
use crate::chain::Checkpoint;
use crate::{Error, Result};

/// Resolve a peer description (`HOST:PORT`) to a socket address.
pub fn parse_ip(s: &str) -> Result<SocketAddr> {
    s.to_socket_addrs().map_err(|_| Error::PeerParseError)?.next().ok_or(Error::PeerParseError)
}

/// Parse a 32 byte hash from its hex encoding.
pub fn parse_hash(s: &str) -> Result<BlockHash> {
    let bytes = hex::decode(s).map_err(|_| Error::CheckpointParseError)?;
    if bytes.len() != 32 {
        return Err(Error::CheckpointParseError);
    }
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&bytes);
    Ok(hash)
}

/// Parse a checkpoint description from the format `HEIGHT:HASH`.
pub fn parse_checkpoint(s: &str) -> Result<Checkpoint> {
    let parts: Vec<&str> = s.split(':').collect();
    if parts.len() != 2 {
        return Err(Error::CheckpointParseError);
    }
    let height = parts[0].parse().map_err(|_| Error::CheckpointParseError)?;
    let hash = parse_hash(parts[1])?;
    Ok(Checkpoint::new(height, hash))
}

#[cfg(test)]
mod test {
    use super::*;

    #[actix_rt::test]
    async fn test_parse_checkpoint() {
        let checkpoint = parse_checkpoint(
            "4000:0101010101010101010101010101010101010101010101010101010101010101",
        )
        .unwrap();
        assert_eq!(checkpoint.height(), 4000);
        assert_eq!(checkpoint.hash(), [1u8; 32]);

        assert!(parse_checkpoint("4000").is_err());
        assert!(parse_checkpoint("x:0101").is_err());
        assert!(parse_checkpoint("1:abcd").is_err());
    }
}
