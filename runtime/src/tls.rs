use crate::{Result, RuntimeError};
use rustls::crypto::{CryptoProvider, ring};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_rustls::TlsAcceptor;
use tokio_rustls::server::TlsStream;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Paths to the server identity and the CAs trusted for client certificates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsMaterial {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    /// Files or directories; empty means the system trust store.
    pub root_cert_paths: Vec<PathBuf>,
}

/// Transport security the server is built with.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Plain TCP; the host is expected to reach the plugin over loopback.
    Insecure,
    Tls(Arc<ServerConfig>),
}

/// Turns TLS material into server credentials.
pub trait TlsSetup: Send + Sync {
    fn make_credentials(&self, material: Option<&TlsMaterial>) -> Result<Credentials>;
}

/// Mutual TLS with `rustls`: TLS 1.2 only, two ECDHE-RSA AES-GCM suites,
/// client certificates required.
#[derive(Debug, Default, Clone, Copy)]
pub struct RustlsSetup;

impl TlsSetup for RustlsSetup {
    fn make_credentials(&self, material: Option<&TlsMaterial>) -> Result<Credentials> {
        let Some(material) = material else {
            return Ok(Credentials::Insecure);
        };

        let provider = Arc::new(CryptoProvider {
            cipher_suites: vec![
                ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                ring::cipher_suite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
            ],
            ..ring::default_provider()
        });

        let certs = load_certs(&material.cert_path)?;
        let key = PrivateKeyDer::from_pem_file(&material.key_path).map_err(|e| {
            RuntimeError::Tls(format!(
                "loading key pair failed: {}: {}",
                material.key_path.display(),
                e
            ))
        })?;

        let roots = load_root_store(&material.root_cert_paths)?;
        let verifier = WebPkiClientVerifier::builder_with_provider(Arc::new(roots), provider.clone())
            .build()
            .map_err(|e| RuntimeError::Tls(format!("unable to verify clients: {}", e)))?;

        let mut config = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS12])?
            .with_client_cert_verifier(verifier)
            .with_single_cert(certs, key)?;
        config.ignore_client_order = true;
        config.alpn_protocols = vec![b"h2".to_vec()];

        Ok(Credentials::Tls(Arc::new(config)))
    }
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|iter| iter.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| {
            RuntimeError::Tls(format!("loading key pair failed: {}: {}", path.display(), e))
        })?;

    if certs.is_empty() {
        return Err(RuntimeError::Tls(format!(
            "loading key pair failed: no certificate in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn add_root_file(roots: &mut RootCertStore, path: &Path) -> Result<usize> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|iter| iter.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| RuntimeError::Tls(format!("unable to read root CAs: {}: {}", path.display(), e)))?;

    let (added, ignored) = roots.add_parsable_certificates(certs);
    if ignored > 0 {
        warn!("Ignored {} unparsable root certificates in {}", ignored, path.display());
    }
    Ok(added)
}

/// Build the client-verification trust store.
///
/// Files must hold at least one certificate. Inside directories, files that
/// hold none are skipped.
pub fn load_root_store(paths: &[PathBuf]) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();

    if paths.is_empty() {
        let native = rustls_native_certs::load_native_certs();
        for e in &native.errors {
            debug!("Error loading system certificate: {}", e);
        }
        let (added, _) = roots.add_parsable_certificates(native.certs);
        debug!("Loaded {} system root certificates", added);
    }

    for path in paths {
        if path.is_dir() {
            let entries = std::fs::read_dir(path).map_err(|e| {
                RuntimeError::Tls(format!("unable to read root CAs: {}: {}", path.display(), e))
            })?;
            for entry in entries.flatten() {
                let file = entry.path();
                if !file.is_file() {
                    continue;
                }
                match add_root_file(&mut roots, &file) {
                    Ok(0) | Err(_) => debug!("No root certificate in {}", file.display()),
                    Ok(n) => debug!("Loaded {} root certificates from {}", n, file.display()),
                }
            }
        } else if add_root_file(&mut roots, path)? == 0 {
            return Err(RuntimeError::Tls(format!(
                "unable to read root CAs: no certificate in {}",
                path.display()
            )));
        }
    }

    if roots.is_empty() {
        return Err(RuntimeError::Tls(
            "unable to read root CAs: no certificates found".to_string(),
        ));
    }
    Ok(roots)
}

/// Accept TCP connections and yield them once the TLS handshake completes.
///
/// Each handshake runs on its own task; failed handshakes are logged and
/// dropped. The accept loop ends when `halt` fires.
pub(crate) fn tls_incoming(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    halt: CancellationToken,
) -> ReceiverStream<io::Result<TlsStream<TcpStream>>> {
    let acceptor = TlsAcceptor::from(config);
    let (tx, rx) = mpsc::channel(16);

    tokio::spawn(async move {
        loop {
            let (tcp, peer) = tokio::select! {
                _ = halt.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!("Failed to accept connection: {}", e);
                        continue;
                    }
                },
            };

            let acceptor = acceptor.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                match acceptor.accept(tcp).await {
                    Ok(stream) => {
                        let _ = tx.send(Ok(stream)).await;
                    }
                    Err(e) => debug!("TLS handshake with {} failed: {}", peer, e),
                }
            });
        }
        debug!("TLS accept loop stopped");
    });

    ReceiverStream::new(rx)
}
