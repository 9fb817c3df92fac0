use super::prelude::*;

use super::address_book::InsertPeers;
use super::peer_channel::{ChannelHandle, ReceivePeers, SendMessage, Subscribe};
use crate::message::GetPeers;

// A one-shot exchange: ask the remote end for the peer addresses it knows
// about and merge the answer into the address book, so that sessions do not
// run dry after exhausting the configured seed peers.

pub struct AddressExchange {
    channel: ChannelHandle,
    address_book: Recipient<InsertPeers>,
}

impl AddressExchange {
    pub fn new(channel: ChannelHandle, address_book: Recipient<InsertPeers>) -> Self {
        AddressExchange { channel, address_book }
    }
}

impl Actor for AddressExchange {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Context<Self>) {
        let _ = self.channel.subscriber.do_send(Subscribe::Peers(ctx.address().recipient()));
        let _ = self.channel.sender.do_send(SendMessage(NetworkMessage::GetPeers(GetPeers)));
    }
}

impl Handler<ReceivePeers> for AddressExchange {
    type Result = ();

    fn handle(&mut self, msg: ReceivePeers, ctx: &mut Context<Self>) -> Self::Result {
        debug!("[address_exchange] received {} addresses from [{}]", msg.addresses.len(), self.channel.ip);
        let _ = self.address_book.do_send(InsertPeers { addresses: msg.addresses });
        ctx.stop();
    }
}
