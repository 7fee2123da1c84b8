#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The Subscriber: greets a registrar over the bus, keeps an
//! [`sdc_core::AddressTable`] in sync with register/unregister traffic, and
//! re-greets on every reconnect.

mod error;
mod messages;
mod metrics;
mod subscriber;

pub use self::error::SubscriberError;
pub use self::messages::{GreetReply, GreetRequest, RegisterMessage, UnregisterMessage};
pub use self::metrics::SubscriberMetrics;
pub use self::subscriber::{State, Subscriber, SubscriberConfig};
