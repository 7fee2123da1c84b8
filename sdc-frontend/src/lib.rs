#![deny(rust_2018_idioms)]
#![forbid(unsafe_code)]

//! The two HTTP surfaces of the controller: a mutually-authenticated TLS
//! JSON endpoint serving registration lookups, and a plaintext admin
//! server for readiness, metrics and log-level control.

mod admin;
mod error;
mod metrics;
mod registration;
mod serve;
mod tls;

pub use self::admin::{serve as serve_admin, LogLevelSetter};
pub use self::error::FrontendError;
pub use self::metrics::FrontendMetrics;
pub use self::serve::serve as serve_registration;
pub use self::tls::load_server_config;
