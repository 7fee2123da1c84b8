//! Builds the mutual-TLS `rustls::ServerConfig` the registration endpoint
//! terminates connections with: client certificates are required and must
//! chain to the configured CA.

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};

pub fn load_server_config(
    ca_cert_path: &Path,
    server_cert_path: &Path,
    server_key_path: &Path,
) -> Result<Arc<ServerConfig>> {
    let mut root_store = RootCertStore::empty();
    for cert in load_certs(ca_cert_path)? {
        root_store
            .add(cert)
            .context("CA certificate is not valid")?;
    }
    let client_verifier = WebPkiClientVerifier::builder(Arc::new(root_store))
        .build()
        .context("failed to build client certificate verifier")?;

    let certs = load_certs(server_cert_path)?;
    let key = load_private_key(server_key_path)?;

    let config = ServerConfig::builder()
        .with_client_cert_verifier(client_verifier)
        .with_single_cert(certs, key)
        .context("server certificate/key pair is not valid")?;

    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read certificate file {}", path.display()))?;
    rustls_pemfile::certs(&mut bytes.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse certificates in {}", path.display()))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read private key file {}", path.display()))?;
    rustls_pemfile::private_key(&mut bytes.as_slice())
        .with_context(|| format!("failed to parse private key in {}", path.display()))?
        .ok_or_else(|| anyhow!("no private key found in {}", path.display()))
}
