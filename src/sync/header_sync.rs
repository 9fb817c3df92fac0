//! The per-channel header sync protocol.
//!
//! A `HeaderSync` drives exactly one peer channel: it repeatedly requests
//! headers from the current tip of the chain, merges the responses under the
//! hash-linkage and checkpoint rules, and completes once the chain has grown
//! past the sync target or the peer has disqualified itself. A rate timer
//! drops peers which fall below the minimum sync rate.
//!
//! The chain is lent to the protocol by the session for the lifetime of the
//! channel and handed back in the completion message, so no two channels can
//! ever mutate it concurrently.

use crate::p2p::prelude::*;

use crate::chain::types::NULL_HASH;
use crate::chain::{CheckpointSet, HashChain};
use crate::message::{GetHeaders, Headers, FULL_HEADERS};
use crate::p2p::peer_channel::{ChannelHandle, ReceiveHeaders, SendMessage, StopChannel, Subscribe};
use crate::p2p::rate_timer::{CancelTimer, RateTimer, ResetTimer, StartTimer, Tick};

const ONE_SECOND: Duration = Duration::from_secs(1);

/// The explicit protocol state. Events arriving after `Done` are no-ops.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum State {
    Idle,
    Requesting,
    Receiving,
    Done,
}

pub struct HeaderSync {
    /// Capability handle onto the channel being driven.
    channel: ChannelHandle,
    /// Headers per second below which the channel is dropped.
    minimum_rate: u32,
    /// Ticks observed since the sync started.
    current_second: u64,
    /// Chain length at construction, for rate measurement.
    start_size: usize,
    /// The height the chain must exceed for this sync to succeed.
    target_height: u64,
    checkpoints: CheckpointSet,
    /// Lent by the session until completion.
    hashes: Option<HashChain>,
    timer: Option<Addr<RateTimer>>,
    /// Resolved exactly once.
    handler: Option<Recipient<HeaderSyncComplete>>,
    state: State,
}

/// Starts the sync against the channel. The handler is resolved exactly once.
#[derive(Message)]
#[rtype(result = "()")]
pub struct StartHeaderSync {
    pub handler: Recipient<HeaderSyncComplete>,
}

/// The end of the header sync sequence; returns the chain to the session.
#[derive(Message)]
#[rtype(result = "()")]
pub struct HeaderSyncComplete {
    pub code: Result<()>,
    pub hashes: HashChain,
}

impl HeaderSync {
    pub fn new(
        channel: ChannelHandle,
        minimum_rate: u32,
        hashes: HashChain,
        checkpoints: CheckpointSet,
    ) -> Self {
        let target_height = Self::target(&hashes, &checkpoints);
        let start_size = hashes.len();
        HeaderSync {
            channel,
            minimum_rate,
            current_second: 0,
            start_size,
            target_height,
            checkpoints,
            hashes: Some(hashes),
            timer: None,
            handler: None,
            state: State::Idle,
        }
    }

    /// The fixed sync target: the highest checkpoint, or the seeded tip when
    /// no checkpoint lies beyond it.
    fn target(hashes: &HashChain, checkpoints: &CheckpointSet) -> u64 {
        let current_block = hashes.first_height() + hashes.len() as u64 - 1;
        match checkpoints.back_height() {
            Some(back_height) => std::cmp::max(back_height, current_block),
            None => current_block,
        }
    }

    pub fn target_height(&self) -> u64 {
        self.target_height
    }

    fn done(&self) -> bool {
        self.state == State::Done
    }

    fn current_rate(&self) -> u64 {
        let size = match self.hashes {
            Some(ref hashes) => hashes.len(),
            None => self.start_size,
        };
        (size - self.start_size) as u64 / self.current_second
    }

    /// Merge a headers message onto the chain tip. Every element must link to
    /// its predecessor by hash and match any checkpoint at its height; the
    /// first violation rolls the chain back and rejects the whole message.
    fn merge_headers(&mut self, message: &Headers) -> Result<bool> {
        let HeaderSync { ref mut hashes, ref checkpoints, .. } = *self;
        let hashes = match hashes.as_mut() {
            Some(hashes) => hashes,
            None => return Ok(false),
        };
        let mut previous = hashes.tip();
        for header in message.elements.iter() {
            let current = header.hash()?;
            if header.previous() != previous
                || !checkpoints.validate(&current, hashes.next_height())
            {
                hashes.rollback(checkpoints);
                return Ok(false);
            }
            previous = current;
            hashes.push(current);
        }
        Ok(true)
    }

    fn send_get_headers(&mut self, ctx: &mut Context<Self>) {
        if self.done() {
            return;
        }
        let tip = match self.hashes {
            Some(ref hashes) => hashes.tip(),
            None => return,
        };
        let packet = GetHeaders::new(vec![tip], NULL_HASH);
        let send = self.channel.sender.send(SendMessage(NetworkMessage::GetHeaders(packet)));
        let send = actix::fut::wrap_future::<_, Self>(send);
        ctx.spawn(send.map(|result, actor, _ctx| {
            if actor.done() {
                return;
            }
            match result {
                Ok(Ok(())) => (),
                Ok(Err(err)) => {
                    debug!(
                        "[header_sync] failure sending get headers to [{}] {:?}",
                        actor.channel.ip, err
                    );
                    actor.complete(Err(err));
                }
                Err(err) => actor.complete(Err(err.into())),
            }
        }));
        self.state = State::Requesting;
    }

    /// Resolves the completion handler exactly once, returns the chain to the
    /// session and releases the channel and the timer.
    fn complete(&mut self, code: Result<()>) {
        let handler = match self.handler.take() {
            Some(handler) => handler,
            None => return,
        };
        self.state = State::Done;
        if let Some(timer) = self.timer.take() {
            timer.do_send(CancelTimer);
        }
        if let Some(hashes) = self.hashes.take() {
            let _ = handler.do_send(HeaderSyncComplete { code, hashes });
        }
        // The session does not need to handle the stop.
        let _ = self.channel.stopper.do_send(StopChannel);
    }
}

impl Actor for HeaderSync {
    type Context = Context<Self>;
}

impl Handler<StartHeaderSync> for HeaderSync {
    type Result = ();

    fn handle(&mut self, msg: StartHeaderSync, ctx: &mut Context<Self>) -> Self::Result {
        self.handler = Some(msg.handler);

        // A peer which does not itself know as much chain as the checkpoints
        // assert cannot drive the sync to its target.
        if self.channel.start_height < self.target_height {
            info!(
                "[header_sync] start height ({}) below header sync target ({}) from [{}]",
                self.channel.start_height, self.target_height, self.channel.ip
            );
            self.complete(Err(Error::ChannelStopped));
            return;
        }

        let timer = RateTimer::new(ctx.address().recipient(), ONE_SECOND).start();
        timer.do_send(StartTimer);
        self.timer = Some(timer);

        let _ = self.channel.subscriber.do_send(Subscribe::Headers(ctx.address().recipient()));
        self.send_get_headers(ctx);
    }
}

impl Handler<ReceiveHeaders> for HeaderSync {
    type Result = ();

    fn handle(&mut self, msg: ReceiveHeaders, ctx: &mut Context<Self>) -> Self::Result {
        if self.done() {
            return;
        }

        let message = match msg.code {
            Ok(message) => message,
            Err(err) => {
                debug!(
                    "[header_sync] failure receiving headers from [{}] {:?}",
                    self.channel.ip, err
                );
                self.complete(Err(err));
                return;
            }
        };

        self.state = State::Receiving;
        match self.merge_headers(&message) {
            Ok(true) => (),
            Ok(false) => {
                info!("[header_sync] failure merging headers from [{}]", self.channel.ip);
                self.complete(Err(Error::PreviousBlockInvalid));
                return;
            }
            Err(err) => {
                self.complete(Err(err));
                return;
            }
        }

        let next_height = match self.hashes {
            Some(ref hashes) => hashes.next_height(),
            None => return,
        };
        info!(
            "[header_sync] synced headers {}-{} from [{}]",
            next_height - message.elements.len() as u64,
            next_height,
            self.channel.ip
        );

        // A full message means the peer has more headers for us.
        if message.elements.len() >= FULL_HEADERS {
            self.send_get_headers(ctx);
            return;
        }

        let success = next_height > self.target_height;
        self.complete(if success { Ok(()) } else { Err(Error::OperationFailed) });
    }
}

impl Handler<Tick> for HeaderSync {
    type Result = ();

    fn handle(&mut self, msg: Tick, _ctx: &mut Context<Self>) -> Self::Result {
        if self.done() {
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
                    "[header_sync] failure in header sync timer for [{}] {:?}",
                    self.channel.ip, err
                );
                self.complete(Err(err));
                return;
            }
        }

        // It was a timeout, so one more second has passed.
        self.current_second += 1;

        // Drop the channel if it falls below the minimum sync rate.
        if self.current_rate() < self.minimum_rate as u64 {
            info!(
                "[header_sync] header sync rate ({}/sec) from [{}]",
                self.current_rate(),
                self.channel.ip
            );
            self.complete(Err(Error::ChannelTimeout));
            return;
        }

        if let Some(ref timer) = self.timer {
            timer.do_send(ResetTimer);
        }
    }
}
