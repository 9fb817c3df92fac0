//! # Frost
//!
//! Frost is an ensemble of actors implementing the initial block download (IBD)
//! phase of a full node.
//!
//! ## Header sync
//!
//! The header sync actors drive a succession of peers to extend a chain of
//! block header hashes from a resume anchor up to the highest hard-coded
//! checkpoint, requiring a quorum of independent peers to replay the sequence
//! before the result is accepted.
//!
//! ## Block sync
//!
//! Once headers are synchronised, the block sync actors download the block
//! bodies for the accumulated hashes in order, under the same serial
//! session / per-channel protocol pattern.

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate actix_derive;
extern crate colored;

pub mod chain;
pub mod channel;
pub mod message;
pub mod node;
pub mod p2p;
pub mod protocol;
pub mod settings;
pub mod sync;
pub mod util;
pub mod version;

#[derive(Debug)]
pub enum Error {
    IO(std::io::Error),
    Bincode(bincode::Error),
    Config(config::ConfigError),

    // actor errors
    ActixMailboxError,

    // channel errors
    ChannelError(String),
    ChannelStopped,
    ChannelTimeout,

    // sync errors
    PreviousBlockInvalid,
    OperationFailed,

    // chain errors
    EmptyChain,
    DuplicateCheckpoint,

    // address book errors
    AddressNotFound,

    // p2p errors
    Timeout,
    IncompatibleVersion,
    HandshakeFailed,

    /// Error when parsing a peer description `IP`
    PeerParseError,
    /// Error when parsing a checkpoint description `HEIGHT:HASH`
    CheckpointParseError,
}

impl std::error::Error for Error {}

impl std::convert::From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::IO(error)
    }
}

impl std::convert::From<bincode::Error> for Error {
    fn from(error: bincode::Error) -> Self {
        Error::Bincode(error)
    }
}

impl std::convert::From<config::ConfigError> for Error {
    fn from(error: config::ConfigError) -> Self {
        Error::Config(error)
    }
}

impl std::convert::From<actix::MailboxError> for Error {
    fn from(_error: actix::MailboxError) -> Self {
        Error::ActixMailboxError
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
