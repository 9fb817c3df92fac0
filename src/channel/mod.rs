//! Typed duplex channels over framed TCP streams.
pub mod asymmetric;

pub use asymmetric::{Channel, Receiver, Sender};
