//! The serial block sync session.
//!
//! Drives [BlockSync] protocols against a succession of peers until `quorum`
//! independent peers have each delivered the block bodies for the synced
//! header hashes. The rotation and quorum rules are the same as for the
//! header session; the hash list itself is immutable in this phase.

use crate::p2p::prelude::*;

use super::block_sync::{BlockSync, BlockSyncComplete, StartBlockSync};
use super::SyncSettings;
use crate::chain::types::{BlockHash, BlockHeight};
use crate::p2p::address_book::{FetchAddress, InsertPeers};
use crate::p2p::address_exchange::AddressExchange;
use crate::p2p::connector::Connect;
use crate::p2p::keep_alive::KeepAlive;
use crate::p2p::peer_channel::ChannelHandle;

pub struct BlockSyncSession {
    address_book: Recipient<FetchAddress>,
    address_book_inserts: Recipient<InsertPeers>,
    connector: Recipient<Connect>,
    /// Successful peer syncs so far.
    votes: u32,
    /// The header hashes whose bodies are wanted, shared by every protocol.
    hashes: Arc<Vec<BlockHash>>,
    /// The height of `hashes[0]`.
    first_height: BlockHeight,
    settings: SyncSettings,
    /// Resolved exactly once, on quorum or on a fatal error.
    handler: Option<Recipient<BlockSessionComplete>>,
    stopped: bool,
}

/// Begin the session. The handler receives [BlockSessionComplete] exactly once.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StartBlockSession {
    pub handler: Recipient<BlockSessionComplete>,
}

/// The end of the block sync cycle.
#[derive(Message)]
#[rtype(result = "()")]
pub struct BlockSessionComplete {
    pub code: Result<()>,
}

/// Suspends the session; no further connections are attempted.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct StopBlockSession;

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
struct NewConnection;

impl BlockSyncSession {
    pub fn new(
        address_book: Recipient<FetchAddress>,
        address_book_inserts: Recipient<InsertPeers>,
        connector: Recipient<Connect>,
        hashes: Arc<Vec<BlockHash>>,
        first_height: BlockHeight,
        settings: SyncSettings,
    ) -> Self {
        BlockSyncSession {
            address_book,
            address_book_inserts,
            connector,
            votes: 0,
            hashes,
            first_height,
            settings,
            handler: None,
            stopped: false,
        }
    }

    fn start_syncing(&mut self, ip: SocketAddr, ctx: &mut Context<Self>) {
        info!("[block_session] contacting sync [{}]", ip);
        let connect = self.connector.send(Connect::new(ip.clone(), self.settings.connect_timeout));
        let connect = actix::fut::wrap_future::<_, Self>(connect);
        ctx.spawn(connect.map(move |result, actor, ctx| {
            if actor.stopped {
                return;
            }
            match result {
                Ok(Ok(channel)) => actor.attach(channel, ctx),
                Ok(Err(err)) => {
                    debug!("[block_session] failure connecting [{}] sync: {:?}", ip, err);
                    ctx.notify(NewConnection);
                }
                Err(err) => actor.fail(err.into()),
            }
        }));
    }

    // This session does not support concurrent channels.
    fn attach(&mut self, channel: ChannelHandle, ctx: &mut Context<Self>) {
        info!("[block_session] connected to sync [{}]", channel.ip);

        KeepAlive::new(channel.clone(), self.settings.keep_alive_period).start();
        AddressExchange::new(channel.clone(), self.address_book_inserts.clone()).start();

        let sync = BlockSync::new(
            channel,
            self.settings.blocks_per_minute,
            self.first_height,
            self.hashes.clone(),
        )
        .start();
        sync.do_send(StartBlockSync { handler: ctx.address().recipient() });
    }

    fn finish(&mut self) {
        if let Some(handler) = self.handler.take() {
            info!("[block_session] block sync complete {}", "✓".green());
            let _ = handler.do_send(BlockSessionComplete { code: Ok(()) });
        }
    }

    fn fail(&mut self, err: Error) {
        error!("[block_session] block sync failed: {:?}", err);
        if let Some(handler) = self.handler.take() {
            let _ = handler.do_send(BlockSessionComplete { code: Err(err) });
        }
    }
}

impl Actor for BlockSyncSession {
    type Context = Context<Self>;

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        debug!("[block_session] stopped");
    }
}

impl Handler<StartBlockSession> for BlockSyncSession {
    type Result = ();

    fn handle(&mut self, msg: StartBlockSession, ctx: &mut Context<Self>) -> Self::Result {
        self.votes = 0;
        self.stopped = false;
        self.handler = Some(msg.handler);
        ctx.notify(NewConnection);
    }
}

impl Handler<NewConnection> for BlockSyncSession {
    type Result = ();

    fn handle(&mut self, _msg: NewConnection, ctx: &mut Context<Self>) -> Self::Result {
        if self.stopped {
            debug!("[block_session] suspending block sync session");
            return;
        }
        let fetch = self.address_book.send(FetchAddress);
        let fetch = actix::fut::wrap_future::<_, Self>(fetch);
        ctx.spawn(fetch.map(|result, actor, ctx| {
            if actor.stopped {
                return;
            }
            match result {
                Ok(Ok(ip)) => actor.start_syncing(ip, ctx),
                // An exhausted address book cannot be rotated past.
                Ok(Err(err)) => actor.fail(err),
                Err(err) => actor.fail(err.into()),
            }
        }));
    }
}

impl Handler<BlockSyncComplete> for BlockSyncSession {
    type Result = ();

    fn handle(&mut self, msg: BlockSyncComplete, ctx: &mut Context<Self>) -> Self::Result {
        let failed = match msg.code {
            Ok(()) => {
                self.votes += 1;
                info!(
                    "[block_session] block sync vote {}/{} {}",
                    self.votes,
                    self.settings.quorum,
                    "✓".green()
                );
                false
            }
            Err(err) => {
                debug!("[block_session] block sync channel failed: {:?}", err);
                true
            }
        };

        // We require a number of successful peer syncs, for maximizing height.
        if failed || self.votes < self.settings.quorum {
            ctx.notify(NewConnection);
            return;
        }

        // This is the end of the block sync cycle.
        self.finish();
    }
}

impl Handler<StopBlockSession> for BlockSyncSession {
    type Result = ();

    fn handle(&mut self, _msg: StopBlockSession, _ctx: &mut Context<Self>) -> Self::Result {
        self.stopped = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::BlockHeader;
    use crate::message::Block;
    use crate::p2p::peer_channel::{ReceiveBlock, SendMessage, StopChannel, Subscribe};

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::mpsc;

    /// A scripted peer which serves block bodies from a canned chain.
    struct FakePeer {
        blocks: Vec<Block>,
        subscriber: Option<Recipient<ReceiveBlock>>,
    }

    impl Actor for FakePeer {
        type Context = Context<Self>;
    }

    impl Handler<Subscribe> for FakePeer {
        type Result = ();

        fn handle(&mut self, msg: Subscribe, _ctx: &mut Context<Self>) -> Self::Result {
            if let Subscribe::Blocks(recipient) = msg {
                self.subscriber = Some(recipient);
            }
        }
    }

    impl Handler<SendMessage> for FakePeer {
        type Result = Result<()>;

        fn handle(&mut self, msg: SendMessage, _ctx: &mut Context<Self>) -> Self::Result {
            let packet = match msg.0 {
                NetworkMessage::GetBlocks(packet) => packet,
                _ => return Ok(()),
            };
            let subscriber = match self.subscriber {
                Some(ref subscriber) => subscriber.clone(),
                None => return Ok(()),
            };
            for wanted in packet.hashes.iter() {
                for block in self.blocks.iter() {
                    if block.hash().unwrap() == *wanted {
                        let _ = subscriber.do_send(ReceiveBlock { code: Ok(block.clone()) });
                    }
                }
            }
            Ok(())
        }
    }

    impl Handler<StopChannel> for FakePeer {
        type Result = ();

        fn handle(&mut self, _msg: StopChannel, _ctx: &mut Context<Self>) -> Self::Result {}
    }

    struct MockAddressBook {
        addresses: VecDeque<SocketAddr>,
    }

    impl Actor for MockAddressBook {
        type Context = Context<Self>;
    }

    impl Handler<FetchAddress> for MockAddressBook {
        type Result = Result<SocketAddr>;

        fn handle(&mut self, _msg: FetchAddress, _ctx: &mut Context<Self>) -> Self::Result {
            self.addresses.pop_front().ok_or(Error::AddressNotFound)
        }
    }

    impl Handler<InsertPeers> for MockAddressBook {
        type Result = ();

        fn handle(&mut self, _msg: InsertPeers, _ctx: &mut Context<Self>) -> Self::Result {}
    }

    struct MockConnector {
        channels: Arc<Mutex<VecDeque<Result<ChannelHandle>>>>,
    }

    impl Actor for MockConnector {
        type Context = Context<Self>;
    }

    impl Handler<Connect> for MockConnector {
        type Result = Result<ChannelHandle>;

        fn handle(&mut self, _msg: Connect, _ctx: &mut Context<Self>) -> Self::Result {
            match self.channels.lock().unwrap().pop_front() {
                Some(channel) => channel,
                None => Err(Error::Timeout),
            }
        }
    }

    struct Probe {
        completions: mpsc::UnboundedSender<Result<()>>,
    }

    impl Actor for Probe {
        type Context = Context<Self>;
    }

    impl Handler<BlockSessionComplete> for Probe {
        type Result = ();

        fn handle(&mut self, msg: BlockSessionComplete, _ctx: &mut Context<Self>) -> Self::Result {
            let _ = self.completions.send(msg.code);
        }
    }

    fn make_blocks(count: usize) -> Vec<Block> {
        let mut previous = [7u8; 32];
        let mut blocks = vec![];
        for i in 0..count {
            let header = BlockHeader::new(previous, [0u8; 32], i as u64, 0);
            previous = header.hash().unwrap();
            blocks.push(Block::new(header, vec![]));
        }
        blocks
    }

    fn peer_handle(peer: Addr<FakePeer>, start_height: u64) -> ChannelHandle {
        ChannelHandle {
            ip: "127.0.0.1:9999".parse().unwrap(),
            start_height,
            sender: peer.clone().recipient(),
            subscriber: peer.clone().recipient(),
            stopper: peer.recipient(),
        }
    }

    async fn expect_completion(rx: &mut mpsc::UnboundedReceiver<Result<()>>) -> Result<()> {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no completion")
            .expect("completion channel closed")
    }

    fn start_session(
        addresses: Vec<SocketAddr>,
        channels: Vec<Result<ChannelHandle>>,
        hashes: Arc<Vec<BlockHash>>,
        quorum: u32,
    ) -> mpsc::UnboundedReceiver<Result<()>> {
        let address_book =
            MockAddressBook { addresses: addresses.into_iter().collect() }.start();
        let connector = MockConnector {
            channels: Arc::new(Mutex::new(channels.into_iter().collect())),
        }
        .start();
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Probe { completions: tx }.start();

        let settings = SyncSettings {
            quorum,
            blocks_per_minute: 0,
            ..SyncSettings::default()
        };
        let session = BlockSyncSession::new(
            address_book.clone().recipient(),
            address_book.recipient(),
            connector.recipient(),
            hashes,
            0,
            settings,
        )
        .start();
        session.do_send(StartBlockSession { handler: probe.recipient() });
        rx
    }

    #[actix_rt::test]
    async fn test_quorum_of_two() {
        let blocks = make_blocks(5);
        let hashes: Vec<_> = blocks.iter().map(|block| block.hash().unwrap()).collect();
        let ip: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        let mut channels = vec![];
        for _ in 0..2 {
            let peer = FakePeer { blocks: blocks.clone(), subscriber: None }.start();
            channels.push(Ok(peer_handle(peer, 5000)));
        }

        let mut rx = start_session(vec![ip; 2], channels, Arc::new(hashes), 2);

        let code = expect_completion(&mut rx).await;
        assert!(code.is_ok());
    }

    #[actix_rt::test]
    async fn test_below_target_peer_is_rotated_out() {
        let blocks = make_blocks(5);
        let hashes: Vec<_> = blocks.iter().map(|block| block.hash().unwrap()).collect();
        let ip: SocketAddr = "127.0.0.1:9001".parse().unwrap();

        let short = FakePeer { blocks: vec![], subscriber: None }.start();
        let good = FakePeer { blocks: blocks.clone(), subscriber: None }.start();
        let channels = vec![Ok(peer_handle(short, 1)), Ok(peer_handle(good, 5000))];

        let mut rx = start_session(vec![ip; 2], channels, Arc::new(hashes), 1);

        let code = expect_completion(&mut rx).await;
        assert!(code.is_ok());
    }

    #[actix_rt::test]
    async fn test_exhausted_address_book_fails_session() {
        let blocks = make_blocks(5);
        let hashes: Vec<_> = blocks.iter().map(|block| block.hash().unwrap()).collect();

        let mut rx = start_session(vec![], vec![], Arc::new(hashes), 1);

        let code = expect_completion(&mut rx).await;
        assert!(matches!(code, Err(Error::AddressNotFound)));
    }
}
