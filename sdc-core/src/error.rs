use thiserror::Error;

/// Errors returned by [`crate::AddressTable`] mutations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// The table has been shut down; the mutation was dropped.
    #[error("address table is shut down")]
    ShutDown,
}
