use super::prelude::*;

use super::peer_channel::{ChannelHandle, ReceivePong, SendMessage, Subscribe};
use crate::message::Ping;

// Pings the channel once per period so that quiet connections are observably
// alive at the remote end. Replies are logged and otherwise unobserved; the
// actor stops itself once the channel is gone.

pub struct KeepAlive {
    channel: ChannelHandle,
    period: Duration,
}

impl KeepAlive {
    pub fn new(channel: ChannelHandle, period: Duration) -> Self {
        KeepAlive { channel, period }
    }
}

#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
struct SendPing;

impl Actor for KeepAlive {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        let _ = self.channel.subscriber.do_send(Subscribe::Pongs(ctx.address().recipient()));
        ctx.notify(SendPing);
    }
}

impl Handler<SendPing> for KeepAlive {
    type Result = ();

    fn handle(&mut self, _msg: SendPing, ctx: &mut Context<Self>) -> Self::Result {
        let ping = Ping::new(rand::random());
        let send = self.channel.sender.send(SendMessage(NetworkMessage::Ping(ping)));
        let send = actix::fut::wrap_future::<_, Self>(send);
        ctx.spawn(send.map(|result, actor, ctx| match result {
            Ok(Ok(())) => {
                ctx.notify_later(SendPing, actor.period.clone());
            }
            _ => {
                debug!("[keep_alive] channel [{}] gone", actor.channel.ip);
                ctx.stop();
            }
        }));
    }
}

impl Handler<ReceivePong> for KeepAlive {
    type Result = ();

    fn handle(&mut self, msg: ReceivePong, _ctx: &mut Context<Self>) -> Self::Result {
        debug!("[keep_alive] pong({}) from [{}]", msg.pong.nonce, self.channel.ip);
    }
}
