use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::config::TlsSettings;

type TlsMaterial = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

/// Server config for the HTTPS listener. Without certificate paths a
/// self-signed localhost certificate is generated.
pub fn server_config(settings: &TlsSettings) -> anyhow::Result<rustls::ServerConfig> {
    let (cert_chain, key) = match (&settings.cert_path, &settings.key_path) {
        (Some(cert), Some(key)) => load_tls_from_files(cert, key)?,
        (None, None) => {
            log::warn!("No TLS certificate configured, using a self-signed one");
            generate_self_signed_tls()?
        }
        _ => bail!("TLS needs both cert_path and key_path, or neither"),
    };

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .context("failed to select TLS protocol versions")?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .context("failed to build TLS server config")
}

fn load_tls_from_files(cert_path: &Path, key_path: &Path) -> anyhow::Result<TlsMaterial> {
    let cert_bytes = std::fs::read(cert_path).with_context(|| {
        format!(
            "failed to read TLS certificate file '{}'",
            cert_path.display()
        )
    })?;

    let key_bytes = std::fs::read(key_path)
        .with_context(|| format!("failed to read TLS key file '{}'", key_path.display()))?;

    let mut cert_reader = Cursor::new(cert_bytes);
    let cert_chain = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<Vec<_>, _>>()
        .context("failed to parse TLS certificate chain")?;

    if cert_chain.is_empty() {
        bail!("TLS certificate chain is empty");
    }

    let mut key_reader = Cursor::new(key_bytes);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .context("failed to parse TLS private key")?
        .ok_or_else(|| anyhow!("no private key found in TLS key file"))?;

    Ok((cert_chain, key))
}

fn generate_self_signed_tls() -> anyhow::Result<TlsMaterial> {
    let subject_alt_names = vec!["localhost".to_string(), "127.0.0.1".to_string()];
    let certified = rcgen::generate_simple_self_signed(subject_alt_names)
        .context("failed to generate self-signed certificate")?;

    let cert_der = certified.cert.der().clone();
    let key_der = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());

    Ok((vec![cert_der], PrivateKeyDer::Pkcs8(key_der)))
}
