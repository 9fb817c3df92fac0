pub use crate::{Error, Result};

pub use actix::{Actor, Handler, Recipient, ResponseFuture};
pub use actix::{ActorFutureExt, ResponseActFuture, WrapFuture};
pub use actix::{Addr, AsyncContext, Context};
pub use actix::ActorContext;

pub use crate::protocol::NetworkMessage;

pub use tokio::time::{timeout, Duration};

pub use std::net::SocketAddr;
pub use std::pin::Pin;
pub use std::sync::Arc;

pub use futures::{Future, FutureExt};

pub use crate::colored::Colorize;

pub use tracing::{debug, error, info, warn};
