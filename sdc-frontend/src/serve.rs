//! The mTLS registration endpoint's accept loop. `hyper::Server::bind`
//! can't be handed a TLS-terminating acceptor directly, so this accepts raw
//! `TcpStream`s, drives the rustls handshake itself, and then serves each
//! connection with `hyper::server::conn::Http`.

use std::future;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::server::conn::Http;
use hyper::service::service_fn;
use rustls::ServerConfig;
use sdc_core::AddressTable;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, info, warn};

use crate::error::FrontendError;
use crate::metrics::FrontendMetrics;
use crate::registration;

pub async fn serve(
    addr: SocketAddr,
    tls_config: Arc<ServerConfig>,
    table: AddressTable,
    metrics: FrontendMetrics,
    drain: drain::Watch,
) -> Result<(), FrontendError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| FrontendError::Bind { addr, source })?;
    let acceptor = TlsAcceptor::from(tls_config);
    info!(%addr, "mTLS registration server listening");

    loop {
        let (stream, peer) = tokio::select! {
            res = listener.accept() => match res {
                Ok(pair) => pair,
                Err(error) => {
                    warn!(%error, "failed to accept connection");
                    continue;
                }
            },
            handle = drain.clone().signaled() => {
                info!("mTLS registration server shutting down");
                handle.release_after(future::ready(())).await;
                return Ok(());
            }
        };
        let acceptor = acceptor.clone();
        let table = table.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(stream) => stream,
                Err(error) => {
                    warn!(%peer, %error, "tls handshake failed");
                    return;
                }
            };
            let service =
                service_fn(move |req| registration::handle(req, table.clone(), metrics.clone()));
            if let Err(error) = Http::new().serve_connection(tls_stream, service).await {
                debug!(%peer, %error, "connection closed with error");
            }
        });
    }
}
