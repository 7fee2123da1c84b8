#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! A publish/subscribe transport abstraction, so the Subscriber can be
//! driven and tested without a real message broker.

mod client;
mod error;
mod nats;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use self::client::{BoxStream, BusClient, Credentials, Message, Session};
pub use self::error::BusError;
pub use self::nats::{NatsBusClient, NatsSession};
