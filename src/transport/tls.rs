//! TLS configuration and certificate loading.
//!
//! # Responsibilities
//! - Build the trusted root store (webpki roots plus an optional PEM bundle)
//! - Build one rustls client config per manager for the configured policy
//! - In `AcceptInvalid` mode, accept failed certificate checks and report each one

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};

use crate::auth::AuthBridge;
use crate::config::TlsConfig;
use crate::dispatch::CorrelationId;
use crate::transport::error::{ErrorKind, TransportError};

/// How certificate validation failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    /// Validation failures abort the exchange.
    #[default]
    Strict,
    /// Validation failures are reported as warnings and the exchange proceeds.
    AcceptInvalid,
}

impl TlsPolicy {
    pub fn from_config(config: &TlsConfig) -> Self {
        if config.accept_invalid_certs {
            TlsPolicy::AcceptInvalid
        } else {
            TlsPolicy::Strict
        }
    }
}

/// The correlation id a manager is currently serving, readable from inside the handshake.
#[derive(Debug, Clone, Default)]
pub struct CurrentRequest(Arc<AtomicU64>);

impl CurrentRequest {
    pub fn set(&self, id: CorrelationId) {
        self.0.store(id.as_u64(), Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(0, Ordering::Release);
    }

    pub fn get(&self) -> Option<CorrelationId> {
        CorrelationId::from_raw(self.0.load(Ordering::Acquire))
    }
}

/// Load extra CA certificates from a PEM file.
pub fn load_extra_roots(path: &Path) -> Result<Vec<CertificateDer<'static>>, TransportError> {
    if !path.exists() {
        return Err(TransportError::new(
            ErrorKind::Unavailable,
            format!("CA bundle not found: {:?}", path),
        ));
    }

    let file = File::open(path).map_err(|e| {
        TransportError::new(ErrorKind::Unavailable, format!("cannot open CA bundle {:?}: {}", path, e))
    })?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            TransportError::new(ErrorKind::Unavailable, format!("cannot parse CA bundle {:?}: {}", path, e))
        })?;

    if certs.is_empty() {
        return Err(TransportError::new(
            ErrorKind::Unavailable,
            format!("CA bundle {:?} contains no certificates", path),
        ));
    }
    Ok(certs)
}

/// Trusted roots: the bundled webpki set plus `extra`.
pub fn root_store(extra: &[CertificateDer<'static>]) -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    for cert in extra {
        if let Err(e) = roots.add(cert.clone()) {
            tracing::warn!(error = %e, "Skipping unusable extra CA certificate");
        }
    }
    roots
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Build a client config for one manager.
pub fn client_config(
    policy: TlsPolicy,
    roots: Arc<RootCertStore>,
    bridge: &Arc<AuthBridge>,
    serving: &CurrentRequest,
) -> Result<ClientConfig, TransportError> {
    let provider = provider();
    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::new(ErrorKind::Tls, format!("unsupported TLS versions: {}", e)))?;

    let config = match policy {
        TlsPolicy::Strict => builder.with_root_certificates(roots).with_no_client_auth(),
        TlsPolicy::AcceptInvalid => {
            let inner = WebPkiServerVerifier::builder_with_provider(roots, provider)
                .build()
                .map_err(|e| TransportError::new(ErrorKind::Tls, format!("cannot build verifier: {}", e)))?;
            let verifier = LenientVerifier {
                inner,
                bridge: bridge.clone(),
                serving: serving.clone(),
            };
            builder
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(verifier))
                .with_no_client_auth()
        }
    };
    Ok(config)
}

/// Runs full webpki validation, but turns a failed chain check into a reported warning.
#[derive(Debug)]
struct LenientVerifier {
    inner: Arc<WebPkiServerVerifier>,
    bridge: Arc<AuthBridge>,
    serving: CurrentRequest,
}

impl ServerCertVerifier for LenientVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Ok(verified) => Ok(verified),
            Err(e) => {
                let errors = [format!("{} ({:?})", e, server_name)];
                self.bridge.relay_tls_errors(self.serving.get(), &errors);
                Ok(ServerCertVerified::assertion())
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
