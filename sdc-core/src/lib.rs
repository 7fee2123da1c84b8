#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! Core data structures for the service-discovery registry: the monotonic
//! clock abstraction, the FQDN address table, and the background pruner
//! that evicts stale entries.

mod clock;
mod error;
mod fqdn;
mod pruner;
mod table;

pub use self::clock::{Clock, SystemClock, TickStream};
pub use self::error::TableError;
pub use self::fqdn::Fqdn;
pub use self::table::{AddressTable, Snapshot};

#[cfg(any(test, feature = "test-util"))]
pub use self::clock::TestClock;
