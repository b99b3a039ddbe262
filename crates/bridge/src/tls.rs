//! rustls client configuration for the outbound HTTPS connection.
//!
//! Trust anchors come exclusively from the configured PEM bundle. Peer
//! certificate and hostname verification use rustls' WebPKI verifier and
//! cannot be switched off through this module.

use std::path::Path;
use std::sync::Arc;

use common::ConfigError;
use rustls::{ClientConfig, RootCertStore};

fn provider() -> Arc<rustls::crypto::CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Check that the TLS stack can negotiate the safe default protocol versions.
///
/// # Errors
///
/// Returns [`ConfigError::TransportUnavailable`] if the crypto provider is unusable.
pub fn ensure_available() -> Result<(), ConfigError> {
    ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map(|_| ())
        .map_err(|e| ConfigError::TransportUnavailable(e.to_string()))
}

/// Read the CA bundle at `path` and build a client config from it.
///
/// # Errors
///
/// Returns [`ConfigError::CaBundleInvalid`] if the file cannot be read or holds
/// no usable certificate.
pub fn load_client_config(path: &Path) -> Result<Arc<ClientConfig>, ConfigError> {
    let pem = std::fs::read(path).map_err(|e| {
        ConfigError::CaBundleInvalid(format!("failed to read {}: {e}", path.display()))
    })?;
    build_client_config(&pem)
}

/// Build a [`rustls::ClientConfig`] trusting only the certificates in `ca_pem`.
///
/// Certificates rustls refuses as trust anchors are skipped; the bundle is
/// rejected only if none remain.
///
/// # Errors
///
/// Returns [`ConfigError::CaBundleInvalid`] if the PEM cannot be parsed or yields
/// no trust anchors, and [`ConfigError::TransportUnavailable`] if rustls
/// rejects the configuration.
pub fn build_client_config(ca_pem: &[u8]) -> Result<Arc<ClientConfig>, ConfigError> {
    let certs = rustls_pemfile::certs(&mut std::io::BufReader::new(ca_pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ConfigError::CaBundleInvalid(format!("failed to parse CA bundle: {e}")))?;

    let mut roots = RootCertStore::empty();
    let (added, ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(ConfigError::CaBundleInvalid(
            "no usable certificates found in CA bundle".into(),
        ));
    }
    if ignored > 0 {
        tracing::warn!(added, ignored, "some CA bundle entries were not usable as trust anchors");
    }

    let config = ClientConfig::builder_with_provider(provider())
        .with_safe_default_protocol_versions()
        .map_err(|e| ConfigError::TransportUnavailable(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Arc::new(config))
}
