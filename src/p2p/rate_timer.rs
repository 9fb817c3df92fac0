use super::prelude::*;

// The rate timer bounds the patience granted to a sync peer. It delivers one
// `Tick` to its executor per elapsed period; the executor decides whether the
// observed rate justifies re-arming the timer or dropping the channel. A
// legitimate tick carries the `ChannelTimeout` code; cancellation delivers a
// final tick carrying the cancellation code (`ChannelStopped`) so that the
// executor observes the same event stream as for a channel teardown.

pub struct RateTimer {
    executor: Recipient<Tick>,
    period: Duration,
    /// A periodic timer re-arms itself after every tick; otherwise the
    /// executor must send `ResetTimer` explicitly.
    periodic: bool,
    handle: Option<actix::SpawnHandle>,
    cancelled: bool,
}

impl RateTimer {
    pub fn new(executor: Recipient<Tick>, period: Duration) -> Self {
        RateTimer { executor, period, periodic: false, handle: None, cancelled: false }
    }

    pub fn periodic(executor: Recipient<Tick>, period: Duration) -> Self {
        RateTimer { executor, period, periodic: true, handle: None, cancelled: false }
    }

    fn arm(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.handle.take() {
            ctx.cancel_future(handle);
        }
        self.handle = Some(ctx.notify_later(Expire, self.period.clone()));
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct StartTimer;

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct ResetTimer;

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct CancelTimer;

#[derive(Message)]
#[rtype(result = "()")]
pub struct Tick {
    pub code: Error,
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
struct Expire;

impl Actor for RateTimer {
    type Context = Context<Self>;

    fn stopped(&mut self, _ctx: &mut Context<Self>) {
        debug!("stopped");
    }
}

impl Handler<StartTimer> for RateTimer {
    type Result = ();

    fn handle(&mut self, _msg: StartTimer, ctx: &mut Context<Self>) -> Self::Result {
        if self.cancelled {
            return;
        }
        self.arm(ctx);
    }
}

impl Handler<ResetTimer> for RateTimer {
    type Result = ();

    fn handle(&mut self, _msg: ResetTimer, ctx: &mut Context<Self>) -> Self::Result {
        if self.cancelled {
            return;
        }
        self.arm(ctx);
    }
}

impl Handler<Expire> for RateTimer {
    type Result = ();

    fn handle(&mut self, _msg: Expire, ctx: &mut Context<Self>) -> Self::Result {
        if self.cancelled {
            return;
        }
        self.handle = None;
        let _ = self.executor.do_send(Tick { code: Error::ChannelTimeout });
        if self.periodic {
            self.arm(ctx);
        }
    }
}

impl Handler<CancelTimer> for RateTimer {
    type Result = ();

    fn handle(&mut self, _msg: CancelTimer, ctx: &mut Context<Self>) -> Self::Result {
        if self.cancelled {
            return;
        }
        self.cancelled = true;
        if let Some(handle) = self.handle.take() {
            ctx.cancel_future(handle);
        }
        let _ = self.executor.do_send(Tick { code: Error::ChannelStopped });
        ctx.stop();
    }
}
