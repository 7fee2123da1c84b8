use thiserror::Error;

/// Errors surfaced by a [`crate::BusClient`]/[`crate::Session`].
#[derive(Debug, Error)]
pub enum BusError {
    /// `connect` could not reach any configured URL within its attempt
    /// budget.
    #[error("no bus server reachable")]
    Unavailable,

    /// A `request` received no reply before its deadline.
    #[error("request timed out")]
    Timeout,

    /// The session has already been closed.
    #[error("bus session is closed")]
    Closed,

    /// Any other transport-level failure.
    #[error("bus transport error: {0}")]
    Transport(#[source] anyhow::Error),
}
