/// The wire protocol version spoken by this node. Peers advertising a
/// different version are rejected during the handshake.
pub const CURRENT_VERSION: u32 = 1;
