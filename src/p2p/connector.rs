use crate::{Error, Result};

use super::peer_channel::{ChannelHandle, PeerChannel};

use crate::channel::Channel;
use crate::message::Version;
use crate::protocol::NetworkMessage;
use crate::version::CURRENT_VERSION;

use actix::{Actor, Context, Handler, ResponseFuture};

use tokio::net::TcpStream;
use tokio::time::{timeout, Duration};

use std::net::SocketAddr;

use tracing::{debug, info};

/// Establishes outbound channels to sync peers.
///
/// A successful `Connect` performs the TCP connect and the version handshake
/// and yields a [ChannelHandle] onto a started [PeerChannel] actor.
pub struct Connector {
    /// The address advertised to peers in the version handshake.
    local_ip: SocketAddr,
    /// The height of the best chain known locally at session start.
    local_start_height: u64,
}

impl Connector {
    pub fn new(local_ip: SocketAddr, local_start_height: u64) -> Self {
        Connector { local_ip, local_start_height }
    }
}

impl Actor for Connector {
    type Context = Context<Self>;
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<ChannelHandle>")]
pub struct Connect {
    pub ip: SocketAddr,
    pub delta: Duration,
}

impl Connect {
    pub fn new(ip: SocketAddr, delta: Duration) -> Self {
        Connect { ip, delta }
    }
}

impl Handler<Connect> for Connector {
    type Result = ResponseFuture<Result<ChannelHandle>>;

    fn handle(&mut self, msg: Connect, _ctx: &mut Context<Self>) -> Self::Result {
        let version = Version::new(self.local_ip.clone(), self.local_start_height);
        Box::pin(async move {
            let stream = match timeout(msg.delta, TcpStream::connect(&msg.ip)).await {
                Ok(result) => result.map_err(Error::IO)?,
                Err(_) => return Err(Error::Timeout),
            };
            info!("[connector] connected to [{}]", msg.ip);

            let channel: Channel<NetworkMessage, NetworkMessage> = Channel::wrap(stream)?;
            let (mut sender, mut receiver) = channel.split();

            // Version handshake: the remote end answers with its own chain
            // facts before any sync traffic is accepted.
            sender.send(NetworkMessage::Version(version)).await?;
            let ack = match timeout(msg.delta, receiver.recv()).await {
                Ok(result) => result?,
                Err(_) => return Err(Error::Timeout),
            };
            let ack = match ack {
                Some(NetworkMessage::VersionAck(ack)) => ack,
                Some(message) => {
                    debug!("[connector] unexpected handshake reply {:?} from [{}]", message, msg.ip);
                    return Err(Error::HandshakeFailed);
                }
                None => return Err(Error::HandshakeFailed),
            };
            if ack.version != CURRENT_VERSION {
                return Err(Error::IncompatibleVersion);
            }

            let address = PeerChannel::new(msg.ip.clone(), sender, receiver).start();
            Ok(ChannelHandle::new(msg.ip, ack.start_height, address))
        })
    }
}
