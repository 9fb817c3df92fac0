//! The per-channel block sync protocol.
//!
//! Runs after header sync: the hash list accumulated by the header phase is
//! immutable here, and the protocol requests the block bodies for those
//! hashes in order. Unsolicited blocks (e.g. announcements) are ignored; the
//! rate floor is measured in blocks per minute.

use crate::p2p::prelude::*;

use crate::chain::types::{BlockHash, BlockHeight};
use crate::message::GetBlocks;
use crate::p2p::peer_channel::{ChannelHandle, ReceiveBlock, SendMessage, StopChannel, Subscribe};
use crate::p2p::rate_timer::{CancelTimer, RateTimer, StartTimer, Tick};

const ONE_MINUTE: Duration = Duration::from_secs(60);

/// Upper bound on the number of bodies requested in one `get_blocks`.
const MAX_BLOCKS_REQUEST: usize = 50_000;

pub struct BlockSync {
    /// Capability handle onto the channel being driven.
    channel: ChannelHandle,
    /// Blocks per minute below which the channel is dropped.
    minimum_rate: u32,
    /// The height of `hashes[0]`.
    first_height: BlockHeight,
    /// The header hashes whose bodies are wanted, in chain order.
    hashes: Arc<Vec<BlockHash>>,
    /// Index of the next expected body.
    hash_index: usize,
    /// Index one past the last hash requested so far.
    batch_end: usize,
    /// Ticks observed since the sync started.
    current_minute: u64,
    timer: Option<Addr<RateTimer>>,
    /// Resolved exactly once.
    handler: Option<Recipient<BlockSyncComplete>>,
    done: bool,
}

/// Starts the sync against the channel. The handler is resolved exactly once.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StartBlockSync {
    pub handler: Recipient<BlockSyncComplete>,
}

/// The end of the block sync sequence.
#[derive(Message)]
#[rtype(result = "()")]
pub struct BlockSyncComplete {
    pub code: Result<()>,
}

impl BlockSync {
    pub fn new(
        channel: ChannelHandle,
        minimum_rate: u32,
        first_height: BlockHeight,
        hashes: Arc<Vec<BlockHash>>,
    ) -> Self {
        BlockSync {
            channel,
            minimum_rate,
            first_height,
            hashes,
            hash_index: 0,
            batch_end: 0,
            current_minute: 0,
            timer: None,
            handler: None,
            done: false,
        }
    }

    fn current_height(&self) -> BlockHeight {
        self.first_height + self.hash_index as u64
    }

    /// The height of the last wanted body, used for peer admission.
    fn target_height(&self) -> BlockHeight {
        self.first_height + self.hashes.len() as u64 - 1
    }

    fn current_rate(&self) -> u64 {
        self.hash_index as u64 / self.current_minute
    }

    fn current_hash(&self) -> BlockHash {
        self.hashes[self.hash_index]
    }

    fn send_get_blocks(&mut self, ctx: &mut Context<Self>) {
        if self.done {
            return;
        }
        if self.hash_index == self.hashes.len() {
            self.complete(Ok(()));
            return;
        }

        let unfilled = self.hashes.len() - self.hash_index;
        let count = std::cmp::min(unfilled, MAX_BLOCKS_REQUEST);
        self.batch_end = self.hash_index + count;
        let packet = GetBlocks::new(self.hashes[self.hash_index..self.batch_end].to_vec());

        let send = self.channel.sender.send(SendMessage(NetworkMessage::GetBlocks(packet)));
        let send = actix::fut::wrap_future::<_, Self>(send);
        ctx.spawn(send.map(|result, actor, _ctx| {
            if actor.done {
                return;
            }
            match result {
                Ok(Ok(())) => (),
                Ok(Err(err)) => {
                    debug!(
                        "[block_sync] failure sending get blocks to [{}] {:?}",
                        actor.channel.ip, err
                    );
                    actor.complete(Err(err));
                }
                Err(err) => actor.complete(Err(err.into())),
            }
        }));
    }

    fn complete(&mut self, code: Result<()>) {
        let handler = match self.handler.take() {
            Some(handler) => handler,
            None => return,
        };
        self.done = true;
        if let Some(timer) = self.timer.take() {
            timer.do_send(CancelTimer);
        }
        let _ = handler.do_send(BlockSyncComplete { code });
        // The session does not need to handle the stop.
        let _ = self.channel.stopper.do_send(StopChannel);
    }
}

impl Actor for BlockSync {
    type Context = Context<Self>;
}

impl Handler<StartBlockSync> for BlockSync {
    type Result = ();

    fn handle(&mut self, msg: StartBlockSync, ctx: &mut Context<Self>) -> Self::Result {
        self.handler = Some(msg.handler);

        if self.channel.start_height < self.target_height() {
            info!(
                "[block_sync] start height ({}) below block sync target ({}) from [{}]",
                self.channel.start_height,
                self.target_height(),
                self.channel.ip
            );
            self.complete(Err(Error::ChannelStopped));
            return;
        }

        let timer = RateTimer::periodic(ctx.address().recipient(), ONE_MINUTE).start();
        timer.do_send(StartTimer);
        self.timer = Some(timer);

        let _ = self.channel.subscriber.do_send(Subscribe::Blocks(ctx.address().recipient()));
        self.send_get_blocks(ctx);
    }
}

impl Handler<ReceiveBlock> for BlockSync {
    type Result = ();

    fn handle(&mut self, msg: ReceiveBlock, ctx: &mut Context<Self>) -> Self::Result {
        if self.done {
            return;
        }

        let block = match msg.code {
            Ok(block) => block,
            Err(err) => {
                debug!(
                    "[block_sync] failure receiving block from [{}] {:?}",
                    self.channel.ip, err
                );
                self.complete(Err(err));
                return;
            }
        };

        let hash = match block.hash() {
            Ok(hash) => hash,
            Err(err) => {
                self.complete(Err(err));
                return;
            }
        };

        if hash != self.current_hash() {
            // We probably received a block announcement, ignore and keep going.
            info!(
                "[block_sync] out of order block {} from [{}] (ignored)",
                hex::encode(hash),
                self.channel.ip
            );
            return;
        }

        info!("[block_sync] synced block #{} from [{}]", self.current_height(), self.channel.ip);
        self.hash_index += 1;

        // Only ask again once the outstanding batch is exhausted.
        if self.hash_index == self.batch_end {
            self.send_get_blocks(ctx);
        }
    }
}

impl Handler<Tick> for BlockSync {
    type Result = ();

    fn handle(&mut self, msg: Tick, _ctx: &mut Context<Self>) -> Self::Result {
        if self.done {
            return;
        }

        match msg.code {
            Error::ChannelStopped => {
                self.complete(Err(Error::ChannelStopped));
                return;
            }
            Error::ChannelTimeout => (),
            err => {
                warn!(
                    "[block_sync] failure in block sync timer for [{}] {:?}",
                    self.channel.ip, err
                );
                self.complete(Err(err));
                return;
            }
        }

        // It was a timeout, so one more minute has passed.
        self.current_minute += 1;

        // Drop the channel if it falls below the min sync rate.
        if self.current_rate() < self.minimum_rate as u64 {
            info!(
                "[block_sync] block sync rate ({}/min) from [{}]",
                self.current_rate(),
                self.channel.ip
            );
            self.complete(Err(Error::ChannelTimeout));
        }
    }
}
