//! The serial header sync session.
//!
//! A `HeaderSyncSession` drives [HeaderSync] protocols against a succession
//! of peers, one channel at a time, until `quorum` independent peers have
//! each driven the shared chain to the checkpoint target. Failed peers are
//! rotated out by drawing a fresh address from the address book; the only
//! session-fatal condition is an exhausted address book.

use crate::p2p::prelude::*;

use super::header_sync::{HeaderSync, HeaderSyncComplete, StartHeaderSync};
use super::SyncSettings;
use crate::chain::{CheckpointSet, HashChain};
use crate::p2p::address_book::{FetchAddress, InsertPeers};
use crate::p2p::address_exchange::AddressExchange;
use crate::p2p::connector::Connect;
use crate::p2p::keep_alive::KeepAlive;
use crate::p2p::peer_channel::ChannelHandle;

pub struct HeaderSyncSession {
    address_book: Recipient<FetchAddress>,
    address_book_inserts: Recipient<InsertPeers>,
    connector: Recipient<Connect>,
    /// Successful peer syncs so far.
    votes: u32,
    /// Lent to the active protocol; present between channels.
    hashes: Option<HashChain>,
    checkpoints: CheckpointSet,
    settings: SyncSettings,
    /// Resolved exactly once, on quorum or on a fatal error.
    handler: Option<Recipient<SessionComplete>>,
    stopped: bool,
}

/// Begin the session. The handler receives [SessionComplete] exactly once.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StartSession {
    pub handler: Recipient<SessionComplete>,
}

/// The end of the header sync cycle; hands the chain back to the caller.
#[derive(Message)]
#[rtype(result = "()")]
pub struct SessionComplete {
    pub code: Result<()>,
    pub hashes: HashChain,
}

/// Suspends the session: no further connections are attempted and the
/// session handler is left to the host's stop path.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct StopSession;

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
struct NewConnection;

impl HeaderSyncSession {
    pub fn new(
        address_book: Recipient<FetchAddress>,
        address_book_inserts: Recipient<InsertPeers>,
        connector: Recipient<Connect>,
        hashes: HashChain,
        checkpoints: CheckpointSet,
        settings: SyncSettings,
    ) -> Self {
        HeaderSyncSession {
            address_book,
            address_book_inserts,
            connector,
            votes: 0,
            hashes: Some(hashes),
            checkpoints,
            settings,
            handler: None,
            stopped: false,
        }
    }

    fn start_syncing(&mut self, ip: SocketAddr, ctx: &mut Context<Self>) {
        info!("[header_session] contacting sync [{}]", ip);
        let connect = self.connector.send(Connect::new(ip.clone(), self.settings.connect_timeout));
        let connect = actix::fut::wrap_future::<_, Self>(connect);
        ctx.spawn(connect.map(move |result, actor, ctx| {
            if actor.stopped {
                return;
            }
            match result {
                Ok(Ok(channel)) => actor.attach(channel, ctx),
                Ok(Err(err)) => {
                    debug!("[header_session] failure connecting [{}] sync: {:?}", ip, err);
                    ctx.notify(NewConnection);
                }
                Err(err) => actor.fail(err.into()),
            }
        }));
    }

    // This session does not support concurrent channels.
    fn attach(&mut self, channel: ChannelHandle, ctx: &mut Context<Self>) {
        info!("[header_session] connected to sync [{}]", channel.ip);
        let hashes = match self.hashes.take() {
            Some(hashes) => hashes,
            None => return,
        };

        KeepAlive::new(channel.clone(), self.settings.keep_alive_period).start();
        AddressExchange::new(channel.clone(), self.address_book_inserts.clone()).start();

        let sync = HeaderSync::new(
            channel,
            self.settings.headers_per_second,
            hashes,
            self.checkpoints.clone(),
        )
        .start();
        sync.do_send(StartHeaderSync { handler: ctx.address().recipient() });
    }

    fn finish(&mut self) {
        if let (Some(handler), Some(hashes)) = (self.handler.take(), self.hashes.take()) {
            info!("[header_session] header sync complete {}", "✓".green());
            let _ = handler.do_send(SessionComplete { code: Ok(()), hashes });
        }
    }

    fn fail(&mut self, err: Error) {
        error!("[header_session] header sync failed: {:?}", err);
        if let (Some(handler), Some(hashes)) = (self.handler.take(), self.hashes.take()) {
            let _ = handler.do_send(SessionComplete { code: Err(err), hashes });
        }
    }
}

impl Actor for HeaderSyncSession {
    type Context = Context<Self>;

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        debug!("[header_session] stopped");
    }
}

impl Handler<StartSession> for HeaderSyncSession {
    type Result = ();

    fn handle(&mut self, msg: StartSession, ctx: &mut Context<Self>) -> Self::Result {
        self.votes = 0;
        self.stopped = false;
        self.handler = Some(msg.handler);
        ctx.notify(NewConnection);
    }
}

impl Handler<NewConnection> for HeaderSyncSession {
    type Result = ();

    fn handle(&mut self, _msg: NewConnection, ctx: &mut Context<Self>) -> Self::Result {
        if self.stopped {
            debug!("[header_session] suspending header sync session");
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

impl Handler<HeaderSyncComplete> for HeaderSyncSession {
    type Result = ();

    fn handle(&mut self, msg: HeaderSyncComplete, ctx: &mut Context<Self>) -> Self::Result {
        self.hashes = Some(msg.hashes);

        let failed = match msg.code {
            Ok(()) => {
                self.votes += 1;
                info!(
                    "[header_session] header sync vote {}/{} {}",
                    self.votes,
                    self.settings.quorum,
                    "✓".green()
                );
                false
            }
            Err(err) => {
                debug!("[header_session] header sync channel failed: {:?}", err);
                true
            }
        };

        // We require a number of successful peer syncs, for maximizing height.
        if failed || self.votes < self.settings.quorum {
            ctx.notify(NewConnection);
            return;
        }

        // This is the end of the header sync cycle.
        self.finish();
    }
}

impl Handler<StopSession> for HeaderSyncSession {
    type Result = ();

    fn handle(&mut self, _msg: StopSession, _ctx: &mut Context<Self>) -> Self::Result {
        self.stopped = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chain::types::BlockHash;
    use crate::chain::{BlockHeader, Checkpoint};
    use crate::message::{GetHeaders, Headers, FULL_HEADERS};
    use crate::p2p::peer_channel::{ReceiveHeaders, SendMessage, StopChannel, Subscribe};

    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// A scripted peer: answers `get_headers` from a canned canonical chain,
    /// or with a corrupted run when `honest` is false.
    struct FakePeer {
        anchor: BlockHash,
        headers: Vec<BlockHeader>,
        hashes: Vec<BlockHash>,
        honest: bool,
        subscriber: Option<Recipient<ReceiveHeaders>>,
    }

    impl FakePeer {
        fn new(anchor: BlockHash, headers: Vec<BlockHeader>, honest: bool) -> Self {
            let mut hashes = vec![anchor];
            for header in headers.iter() {
                hashes.push(header.hash().unwrap());
            }
            FakePeer { anchor, headers, hashes, honest, subscriber: None }
        }
    }

    impl Actor for FakePeer {
        type Context = Context<Self>;
    }

    impl Handler<Subscribe> for FakePeer {
        type Result = ();

        fn handle(&mut self, msg: Subscribe, _ctx: &mut Context<Self>) -> Self::Result {
            if let Subscribe::Headers(recipient) = msg {
                self.subscriber = Some(recipient);
            }
        }
    }

    impl Handler<SendMessage> for FakePeer {
        type Result = Result<()>;

        fn handle(&mut self, msg: SendMessage, _ctx: &mut Context<Self>) -> Self::Result {
            let packet = match msg.0 {
                NetworkMessage::GetHeaders(packet) => packet,
                _ => return Ok(()),
            };
            let subscriber = match self.subscriber {
                Some(ref subscriber) => subscriber.clone(),
                None => return Ok(()),
            };
            let elements = self.reply(&packet);
            let _ = subscriber.do_send(ReceiveHeaders { code: Ok(Headers::new(elements)) });
            Ok(())
        }
    }

    impl Handler<StopChannel> for FakePeer {
        type Result = ();

        fn handle(&mut self, _msg: StopChannel, _ctx: &mut Context<Self>) -> Self::Result {}
    }

    impl FakePeer {
        fn reply(&self, packet: &GetHeaders) -> Vec<BlockHeader> {
            if !self.honest {
                // Unlinked garbage
                return vec![BlockHeader::new([13u8; 32], [0u8; 32], 0, 0); 5];
            }
            let tip = packet.locator[0];
            match self.hashes.iter().position(|hash| *hash == tip) {
                Some(i) => {
                    let end = std::cmp::min(i + FULL_HEADERS, self.headers.len());
                    self.headers[i..end].to_vec()
                }
                None => vec![],
            }
        }
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
        connects: Arc<Mutex<u32>>,
    }

    impl Actor for MockConnector {
        type Context = Context<Self>;
    }

    impl Handler<Connect> for MockConnector {
        type Result = Result<ChannelHandle>;

        fn handle(&mut self, _msg: Connect, _ctx: &mut Context<Self>) -> Self::Result {
            *self.connects.lock().unwrap() += 1;
            match self.channels.lock().unwrap().pop_front() {
                Some(channel) => channel,
                None => Err(Error::Timeout),
            }
        }
    }

    struct Probe {
        completions: mpsc::UnboundedSender<(Result<()>, HashChain)>,
    }

    impl Actor for Probe {
        type Context = Context<Self>;
    }

    impl Handler<SessionComplete> for Probe {
        type Result = ();

        fn handle(&mut self, msg: SessionComplete, _ctx: &mut Context<Self>) -> Self::Result {
            let _ = self.completions.send((msg.code, msg.hashes));
        }
    }

    fn anchor() -> BlockHash {
        [7u8; 32]
    }

    fn make_headers(previous: BlockHash, count: usize) -> Vec<BlockHeader> {
        let mut headers = vec![];
        let mut previous = previous;
        for i in 0..count {
            let header = BlockHeader::new(previous, [0u8; 32], i as u64, 0);
            previous = header.hash().unwrap();
            headers.push(header);
        }
        headers
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

    fn settings(quorum: u32) -> SyncSettings {
        SyncSettings { quorum, headers_per_second: 0, ..SyncSettings::default() }
    }

    struct Harness {
        completions: mpsc::UnboundedReceiver<(Result<()>, HashChain)>,
        connects: Arc<Mutex<u32>>,
    }

    fn start_session(
        addresses: Vec<SocketAddr>,
        channels: Vec<Result<ChannelHandle>>,
        checkpoints: CheckpointSet,
        quorum: u32,
    ) -> Harness {
        let address_book =
            MockAddressBook { addresses: addresses.into_iter().collect() }.start();
        let connects = Arc::new(Mutex::new(0));
        let connector = MockConnector {
            channels: Arc::new(Mutex::new(channels.into_iter().collect())),
            connects: connects.clone(),
        }
        .start();
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = Probe { completions: tx }.start();

        let session = HeaderSyncSession::new(
            address_book.clone().recipient(),
            address_book.recipient(),
            connector.recipient(),
            HashChain::new(anchor(), 0),
            checkpoints,
            settings(quorum),
        )
        .start();
        session.do_send(StartSession { handler: probe.recipient() });

        Harness { completions: rx, connects }
    }

    async fn expect_completion(harness: &mut Harness) -> (Result<()>, HashChain) {
        timeout(Duration::from_secs(2), harness.completions.recv())
            .await
            .expect("no completion")
            .expect("completion channel closed")
    }

    #[actix_rt::test]
    async fn test_quorum_of_three() {
        let headers = make_headers(anchor(), 120);
        let checkpoints = CheckpointSet::new(vec![Checkpoint::new(
            100,
            headers[99].hash().unwrap(),
        )])
        .unwrap();

        let ip: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let mut channels = vec![];
        for _ in 0..3 {
            let peer = FakePeer::new(anchor(), headers.clone(), true).start();
            channels.push(Ok(peer_handle(peer, 5000)));
        }

        let mut harness = start_session(vec![ip; 3], channels, checkpoints, 3);

        let (code, hashes) = expect_completion(&mut harness).await;
        assert!(code.is_ok());
        // The first peer extends the chain past the target; the replays by
        // the remaining quorum members leave it unchanged.
        assert_eq!(hashes.len(), 121);
        assert_eq!(*harness.connects.lock().unwrap(), 3);
    }

    #[actix_rt::test]
    async fn test_dishonest_peer_is_rotated_out() {
        let headers = make_headers(anchor(), 120);
        let checkpoints = CheckpointSet::new(vec![Checkpoint::new(
            100,
            headers[99].hash().unwrap(),
        )])
        .unwrap();

        let ip: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let bad = FakePeer::new(anchor(), vec![], false).start();
        let good = FakePeer::new(anchor(), headers, true).start();
        let channels = vec![Ok(peer_handle(bad, 5000)), Ok(peer_handle(good, 5000))];

        let mut harness = start_session(vec![ip; 2], channels, checkpoints, 1);

        let (code, hashes) = expect_completion(&mut harness).await;
        assert!(code.is_ok());
        assert_eq!(hashes.len(), 121);
        assert_eq!(*harness.connects.lock().unwrap(), 2);
    }

    #[actix_rt::test]
    async fn test_connect_failure_is_rotated_past() {
        let headers = make_headers(anchor(), 120);
        let checkpoints = CheckpointSet::new(vec![Checkpoint::new(
            100,
            headers[99].hash().unwrap(),
        )])
        .unwrap();

        let ip: SocketAddr = "127.0.0.1:9001".parse().unwrap();
        let good = FakePeer::new(anchor(), headers, true).start();
        let channels = vec![Err(Error::Timeout), Ok(peer_handle(good, 5000))];

        let mut harness = start_session(vec![ip; 2], channels, checkpoints, 1);

        let (code, _hashes) = expect_completion(&mut harness).await;
        assert!(code.is_ok());
        assert_eq!(*harness.connects.lock().unwrap(), 2);
    }

    #[actix_rt::test]
    async fn test_exhausted_address_book_fails_session() {
        let checkpoints =
            CheckpointSet::new(vec![Checkpoint::new(100, [1u8; 32])]).unwrap();
        let mut harness = start_session(vec![], vec![], checkpoints, 1);

        let (code, hashes) = expect_completion(&mut harness).await;
        assert!(matches!(code, Err(Error::AddressNotFound)));
        // The chain is handed back untouched
        assert_eq!(hashes.hashes(), &[anchor()]);
    }
}
