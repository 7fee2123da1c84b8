use std::net::SocketAddr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to build TLS server config: {0}")]
    Tls(#[source] anyhow::Error),
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
}
