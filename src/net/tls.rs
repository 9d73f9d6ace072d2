//! TLS configuration and certificate loading.

use std::path::Path;

use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};

use crate::config::TlsConfig;

/// Load TLS configuration from certificate and key files.
pub async fn load_tls_config(cert_path: &Path, key_path: &Path) -> Result<RustlsConfig, std::io::Error> {
    if !cert_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Certificate file not found: {:?}", cert_path),
        ));
    }
    if !key_path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Private key file not found: {:?}", key_path),
        ));
    }

    RustlsConfig::from_pem_file(cert_path, key_path).await
}

/// Build the handshake acceptor for a listener, if TLS is configured.
pub async fn acceptor(config: Option<&TlsConfig>) -> Result<Option<RustlsAcceptor>, std::io::Error> {
    let Some(tls) = config else {
        return Ok(None);
    };

    let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
    tracing::info!(cert_path = %tls.cert_path, "TLS enabled on listener");
    Ok(Some(RustlsAcceptor::new(rustls)))
}
