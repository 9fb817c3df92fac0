use super::prelude::*;

use rand::seq::SliceRandom;

use std::collections::HashSet;

/// The address book contains the most up to date set of sync peer addresses.
///
/// Addresses are handed out one at a time in a shuffled rotation so that
/// successive sync attempts spread over the known peers rather than hammering
/// a single address.
pub struct AddressBook {
    /// The local listener address, which is never handed out.
    local_ip: SocketAddr,
    peers: HashSet<SocketAddr>,
    /// A reshuffled drain of `peers` used to serve fetches.
    queue: Vec<SocketAddr>,
}

impl AddressBook {
    pub fn new(local_ip: SocketAddr, seed: Vec<SocketAddr>) -> Self {
        let mut address_book = AddressBook { local_ip, peers: HashSet::new(), queue: vec![] };
        address_book.insert_addresses(seed);
        address_book
    }

    fn insert_addresses(&mut self, addresses: Vec<SocketAddr>) {
        for ip in addresses.iter() {
            if *ip == self.local_ip {
                continue;
            }
            if self.peers.insert(ip.clone()) {
                debug!("[address_book] inserted <ip: {:?}>", ip);
            }
        }
    }

    fn refill(&mut self) {
        self.queue = self.peers.iter().cloned().collect();
        self.queue.shuffle(&mut rand::thread_rng());
    }
}

impl Actor for AddressBook {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Context<Self>) {
        debug!(": started");
    }
}

/// Draw one candidate sync peer address.
#[derive(Debug, Clone, Message)]
#[rtype(result = "Result<SocketAddr>")]
pub struct FetchAddress;

impl Handler<FetchAddress> for AddressBook {
    type Result = Result<SocketAddr>;

    fn handle(&mut self, _msg: FetchAddress, _ctx: &mut Context<Self>) -> Self::Result {
        if self.peers.is_empty() {
            return Err(Error::AddressNotFound);
        }
        if self.queue.is_empty() {
            self.refill();
        }
        // The queue is non-empty after a refill from a non-empty peer set
        self.queue.pop().ok_or(Error::AddressNotFound)
    }
}

/// Merge addresses learned from a peer into the book.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct InsertPeers {
    pub addresses: Vec<SocketAddr>,
}

impl Handler<InsertPeers> for AddressBook {
    type Result = ();

    fn handle(&mut self, msg: InsertPeers, _ctx: &mut Context<Self>) -> Self::Result {
        self.insert_addresses(msg.addresses);
    }
}
