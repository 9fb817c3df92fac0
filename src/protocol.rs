//! The node network message protocol.
use crate::message;

/// Every message exchanged on a peer channel. Encoded with `bincode` inside
/// length-delimited frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NetworkMessage {
    // Handshake
    Version(message::Version),
    VersionAck(message::VersionAck),
    // Keep alive
    Ping(message::Ping),
    Pong(message::Pong),
    // Header sync
    GetHeaders(message::GetHeaders),
    Headers(message::Headers),
    // Block sync
    GetBlocks(message::GetBlocks),
    Block(message::Block),
    // Address exchange
    GetPeers(message::GetPeers),
    Peers(message::Peers),
}
