#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ping {
    pub nonce: u64,
}

impl Ping {
    pub fn new(nonce: u64) -> Self {
        Ping { nonce }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pong {
    pub nonce: u64,
}

impl Pong {
    pub fn new(nonce: u64) -> Self {
        Pong { nonce }
    }
}
