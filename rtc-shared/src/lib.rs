#![warn(rust_2018_idioms)]
#![allow(dead_code)]

#[cfg(feature = "crypto")]
pub mod crypto;

#[cfg(feature = "replay")]
pub mod replay_detector;

pub mod error;
pub(crate) mod transport;
pub mod util;

pub use transport::{TaggedBytesMut, TransportContext, TransportMessage, TransportProtocol};
