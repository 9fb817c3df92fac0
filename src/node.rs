//! Node bootstrap.
//!
//! Wires the address book, the connector and the sync sessions together and
//! runs the two sync phases in order: headers to the checkpoint target, then
//! block bodies for the accumulated hashes.

use crate::chain::types::BlockHash;
use crate::chain::{CheckpointSet, HashChain};
use crate::p2p::address_book::AddressBook;
use crate::p2p::connector::Connector;
use crate::settings::Settings;
use crate::sync::block_session::{BlockSessionComplete, BlockSyncSession, StartBlockSession};
use crate::sync::header_session::{HeaderSyncSession, SessionComplete, StartSession};
use crate::sync::SyncSettings;
use crate::util;
use crate::Result;

use actix::{Actor, Addr, Arbiter, AsyncContext, Context, Handler};

use tokio::time::Duration;

use std::sync::Arc;

use crate::colored::Colorize;
use tracing::{error, info};

pub struct Node {
    address_book: Addr<AddressBook>,
    connector: Addr<Connector>,
    checkpoints: CheckpointSet,
    /// Present until handed to the header session.
    hashes: Option<HashChain>,
    settings: SyncSettings,
    header_session: Option<Addr<HeaderSyncSession>>,
    block_session: Option<Addr<BlockSyncSession>>,
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct StartNode;

impl Actor for Node {
    type Context = Context<Self>;
}

impl Handler<StartNode> for Node {
    type Result = ();

    fn handle(&mut self, _msg: StartNode, ctx: &mut Context<Self>) -> Self::Result {
        let hashes = match self.hashes.take() {
            Some(hashes) => hashes,
            None => return,
        };
        info!(
            "[node] starting header sync from height {} towards {:?}",
            hashes.next_height() - 1,
            self.checkpoints.back_height()
        );
        let session = HeaderSyncSession::new(
            self.address_book.clone().recipient(),
            self.address_book.clone().recipient(),
            self.connector.clone().recipient(),
            hashes,
            self.checkpoints.clone(),
            self.settings.clone(),
        )
        .start();
        session.do_send(StartSession { handler: ctx.address().recipient() });
        self.header_session = Some(session);
    }
}

impl Handler<SessionComplete> for Node {
    type Result = ();

    fn handle(&mut self, msg: SessionComplete, ctx: &mut Context<Self>) -> Self::Result {
        self.header_session = None;
        if let Err(err) = msg.code {
            error!("[node] header sync failed: {:?}", err);
            actix::System::current().stop();
            return;
        }
        let first_height = msg.hashes.first_height();
        let hashes: Arc<Vec<BlockHash>> = Arc::new(msg.hashes.hashes().to_vec());
        info!(
            "[node] headers synchronised up to height {} {}",
            first_height + hashes.len() as u64 - 1,
            "✓".green()
        );

        let session = BlockSyncSession::new(
            self.address_book.clone().recipient(),
            self.address_book.clone().recipient(),
            self.connector.clone().recipient(),
            hashes,
            first_height,
            self.settings.clone(),
        )
        .start();
        session.do_send(StartBlockSession { handler: ctx.address().recipient() });
        self.block_session = Some(session);
    }
}

impl Handler<BlockSessionComplete> for Node {
    type Result = ();

    fn handle(&mut self, msg: BlockSessionComplete, _ctx: &mut Context<Self>) -> Self::Result {
        self.block_session = None;
        match msg.code {
            Ok(()) => info!("[node] initial block download complete {}", "✓".green()),
            Err(err) => error!("[node] block sync failed: {:?}", err),
        }
        actix::System::current().stop();
    }
}

pub fn run(settings: Settings) -> Result<()> {
    let listener_ip = util::parse_ip(&settings.listener_ip)?;
    let sync_peers = settings
        .sync_peers
        .iter()
        .map(|peer| util::parse_ip(peer))
        .collect::<Result<Vec<_>>>()?;

    let mut checkpoints = vec![];
    for checkpoint in settings.checkpoints.iter() {
        checkpoints.push(util::parse_checkpoint(checkpoint)?);
    }
    let checkpoints = CheckpointSet::new(checkpoints)?;

    let anchor = util::parse_checkpoint(&settings.anchor)?;
    let hashes = HashChain::new(anchor.hash(), anchor.height());

    let sync_settings = SyncSettings {
        quorum: settings.quorum,
        headers_per_second: settings.headers_per_second,
        blocks_per_minute: settings.blocks_per_minute,
        connect_timeout: Duration::from_secs(settings.connect_timeout_seconds),
        keep_alive_period: Duration::from_secs(settings.keep_alive_seconds),
    };

    let execution = async move {
        let address_book = AddressBook::new(listener_ip.clone(), sync_peers).start();
        let connector = Connector::new(listener_ip, anchor.height()).start();
        let node = Node {
            address_book,
            connector,
            checkpoints,
            hashes: Some(hashes),
            settings: sync_settings,
            header_session: None,
            block_session: None,
        }
        .start();
        // The sessions hold a recipient back onto the node, which keeps it
        // alive after this future completes.
        node.do_send(StartNode);
    };

    let arbiter = Arbiter::new();
    arbiter.spawn(execution);

    Ok(())
}
