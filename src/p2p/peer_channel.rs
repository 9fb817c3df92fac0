//! The peer channel actor.
//!
//! A `PeerChannel` owns one framed TCP connection to a remote peer. Outbound
//! messages are queued through [SendMessage] onto a dedicated writer task;
//! inbound messages are routed to the subscribers registered via [Subscribe].
//! Stopping the channel notifies every message subscriber exactly once with
//! `ChannelStopped`, whether the stop was requested locally or caused by the
//! transport.

use super::prelude::*;

use crate::chain::types::BlockHeight;
use crate::channel::{Receiver, Sender};
use crate::message::{Block, Headers, Pong};

use actix::ActorContext;
use actix::StreamHandler;

use futures::stream;

use tokio::sync::mpsc;

type ChannelSender = Sender<NetworkMessage, NetworkMessage>;
type ChannelReceiver = Receiver<NetworkMessage, NetworkMessage>;

/// Queue a message for transmission to the peer.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<()>")]
pub struct SendMessage(pub NetworkMessage);

/// Register interest in a kind of inbound message.
#[derive(Message)]
#[rtype(result = "()")]
pub enum Subscribe {
    Headers(Recipient<ReceiveHeaders>),
    Blocks(Recipient<ReceiveBlock>),
    Pongs(Recipient<ReceivePong>),
    Peers(Recipient<ReceivePeers>),
}

/// Request the channel to stop. Subscribers observe `ChannelStopped`.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct StopChannel;

#[derive(Message)]
#[rtype(result = "()")]
pub struct ReceiveHeaders {
    pub code: Result<Headers>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct ReceiveBlock {
    pub code: Result<Block>,
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct ReceivePong {
    pub pong: Pong,
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct ReceivePeers {
    pub addresses: Vec<SocketAddr>,
}

/// A capability handle onto a live peer channel.
///
/// The handle does not own the channel actor; it only carries the recipients
/// needed to drive it, together with the facts established by the version
/// handshake.
#[derive(Clone)]
pub struct ChannelHandle {
    /// The authority (remote address) of the peer.
    pub ip: SocketAddr,
    /// The peer's advertised start height from the version handshake.
    pub start_height: BlockHeight,
    pub sender: Recipient<SendMessage>,
    pub subscriber: Recipient<Subscribe>,
    pub stopper: Recipient<StopChannel>,
}

impl ChannelHandle {
    pub fn new(ip: SocketAddr, start_height: BlockHeight, address: Addr<PeerChannel>) -> Self {
        ChannelHandle {
            ip,
            start_height,
            sender: address.clone().recipient(),
            subscriber: address.clone().recipient(),
            stopper: address.recipient(),
        }
    }
}

pub struct PeerChannel {
    ip: SocketAddr,
    writer: Option<ChannelSender>,
    reader: Option<ChannelReceiver>,
    outbound: Option<mpsc::UnboundedSender<NetworkMessage>>,
    outbound_queue: Option<mpsc::UnboundedReceiver<NetworkMessage>>,
    headers_subscriber: Option<Recipient<ReceiveHeaders>>,
    blocks_subscriber: Option<Recipient<ReceiveBlock>>,
    pong_subscriber: Option<Recipient<ReceivePong>>,
    peers_subscriber: Option<Recipient<ReceivePeers>>,
    stopped: bool,
}

impl PeerChannel {
    pub fn new(ip: SocketAddr, writer: ChannelSender, reader: ChannelReceiver) -> Self {
        let (outbound, outbound_queue) = mpsc::unbounded_channel();
        PeerChannel {
            ip,
            writer: Some(writer),
            reader: Some(reader),
            outbound: Some(outbound),
            outbound_queue: Some(outbound_queue),
            headers_subscriber: None,
            blocks_subscriber: None,
            pong_subscriber: None,
            peers_subscriber: None,
            stopped: false,
        }
    }

    fn enqueue(&self, message: NetworkMessage) {
        if let Some(ref outbound) = self.outbound {
            let _ = outbound.send(message);
        }
    }

    /// Notifies the message subscribers once and stops the actor.
    fn halt(&mut self, ctx: &mut Context<Self>) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.outbound = None;
        if let Some(subscriber) = self.headers_subscriber.take() {
            let _ = subscriber.do_send(ReceiveHeaders { code: Err(Error::ChannelStopped) });
        }
        if let Some(subscriber) = self.blocks_subscriber.take() {
            let _ = subscriber.do_send(ReceiveBlock { code: Err(Error::ChannelStopped) });
        }
        self.pong_subscriber = None;
        self.peers_subscriber = None;
        ctx.stop();
    }
}

impl Actor for PeerChannel {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        // The writer task drains the outbound queue for the lifetime of the
        // connection. A write failure stops the channel.
        if let (Some(mut writer), Some(mut queue)) = (self.writer.take(), self.outbound_queue.take())
        {
            let address = ctx.address();
            actix::spawn(async move {
                while let Some(message) = queue.recv().await {
                    if let Err(err) = writer.send(message).await {
                        warn!("[channel] failed to write to peer: {:?}", err);
                        address.do_send(StopChannel);
                        break;
                    }
                }
            });
        }
        if let Some(reader) = self.reader.take() {
            ctx.add_stream(stream::unfold(Some(reader), |state| async move {
                let mut reader = state?;
                match reader.recv().await {
                    Ok(Some(message)) => Some((Ok(message), Some(reader))),
                    Ok(None) => None,
                    Err(err) => Some((Err(err), None)),
                }
            }));
        }
    }

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        debug!("[channel] stopped [{}]", self.ip);
    }
}

impl StreamHandler<Result<NetworkMessage>> for PeerChannel {
    fn handle(&mut self, item: Result<NetworkMessage>, ctx: &mut Context<Self>) {
        let message = match item {
            Ok(message) => message,
            Err(err) => {
                debug!("[channel] read failure from [{}]: {:?}", self.ip, err);
                self.halt(ctx);
                return;
            }
        };
        match message {
            NetworkMessage::Headers(headers) => match self.headers_subscriber {
                Some(ref subscriber) => {
                    let _ = subscriber.do_send(ReceiveHeaders { code: Ok(headers) });
                }
                None => debug!("[channel] unsolicited headers from [{}]", self.ip),
            },
            NetworkMessage::Block(block) => match self.blocks_subscriber {
                Some(ref subscriber) => {
                    let _ = subscriber.do_send(ReceiveBlock { code: Ok(block) });
                }
                None => debug!("[channel] unsolicited block from [{}]", self.ip),
            },
            NetworkMessage::Pong(pong) => {
                if let Some(ref subscriber) = self.pong_subscriber {
                    let _ = subscriber.do_send(ReceivePong { pong });
                }
            }
            NetworkMessage::Peers(peers) => {
                if let Some(ref subscriber) = self.peers_subscriber {
                    let _ = subscriber.do_send(ReceivePeers { addresses: peers.addresses });
                }
            }
            NetworkMessage::Ping(ping) => {
                // Pings are answered by the channel itself so that the sync
                // protocols never have to observe them.
                self.enqueue(NetworkMessage::Pong(Pong::new(ping.nonce)));
            }
            message => debug!("[channel] ignoring {:?} from [{}]", message, self.ip),
        }
    }

    fn finished(&mut self, ctx: &mut Context<Self>) {
        debug!("[channel] peer [{}] closed the connection", self.ip);
        self.halt(ctx);
    }
}

impl Handler<SendMessage> for PeerChannel {
    type Result = Result<()>;

    fn handle(&mut self, msg: SendMessage, _ctx: &mut Context<Self>) -> Self::Result {
        match self.outbound {
            Some(ref outbound) => outbound.send(msg.0).map_err(|_| Error::ChannelStopped),
            None => Err(Error::ChannelStopped),
        }
    }
}

impl Handler<Subscribe> for PeerChannel {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _ctx: &mut Context<Self>) -> Self::Result {
        match msg {
            Subscribe::Headers(recipient) => self.headers_subscriber = Some(recipient),
            Subscribe::Blocks(recipient) => self.blocks_subscriber = Some(recipient),
            Subscribe::Pongs(recipient) => self.pong_subscriber = Some(recipient),
            Subscribe::Peers(recipient) => self.peers_subscriber = Some(recipient),
        }
    }
}

impl Handler<StopChannel> for PeerChannel {
    type Result = ();

    fn handle(&mut self, _msg: StopChannel, ctx: &mut Context<Self>) -> Self::Result {
        debug!("[channel] stop requested for [{}]", self.ip);
        self.halt(ctx);
    }
}
