// Trust policy for pinned deployments
//
// A caller-supplied anchor set replaces the bundled web roots. Hostname
// checks follow `HostnamePolicy`; the pinned-certificate relaxation only
// exists inside the verifier built here and never touches default trust.

use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{
    CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};

use crate::error::{OutreachError, Result};

/// How the server identity is checked against the requested hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostnamePolicy {
    /// Accept a peer whose end-entity certificate is one of the pinned
    /// anchors, whatever its subject; otherwise apply the standard check.
    /// The pinned certificate must still be within its validity period.
    #[default]
    AcceptPinned,

    /// Always require the certificate to match the requested hostname
    Strict,
}

/// Immutable set of trust anchors plus hostname policy
#[derive(Debug, Clone)]
pub struct TrustPolicy {
    anchors: Vec<CertificateDer<'static>>,
    roots: Arc<RootCertStore>,
    hostname_policy: HostnamePolicy,
}

impl TrustPolicy {
    /// Build from DER-encoded certificates
    pub fn new(anchors: Vec<CertificateDer<'static>>) -> Result<Self> {
        if anchors.is_empty() {
            return Err(OutreachError::Config(
                "trust anchor set did not contain any certificates".into(),
            ));
        }

        let mut roots = RootCertStore::empty();
        for (idx, cert) in anchors.iter().enumerate() {
            roots.add(cert.clone()).map_err(|e| {
                OutreachError::Config(format!("Invalid trust anchor #{}: {}", idx, e))
            })?;
        }

        Ok(Self {
            anchors,
            roots: Arc::new(roots),
            hostname_policy: HostnamePolicy::default(),
        })
    }

    /// Build from raw DER certificates
    pub fn from_der<I>(certs: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        Self::new(certs.into_iter().map(CertificateDer::from).collect())
    }

    /// Build from a PEM bundle
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let mut reader = pem;
        let certs = rustls_pemfile::certs(&mut reader)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| OutreachError::Config(format!("Invalid PEM trust bundle: {}", e)))?;

        Self::new(certs)
    }

    /// Build from a PEM bundle on disk
    pub fn from_pem_file(path: &Path) -> Result<Self> {
        let pem = std::fs::read(path).map_err(|e| {
            OutreachError::Config(format!(
                "Failed to read trust bundle {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_pem(&pem)
    }

    pub fn with_hostname_policy(mut self, policy: HostnamePolicy) -> Self {
        self.hostname_policy = policy;
        self
    }

    pub fn hostname_policy(&self) -> HostnamePolicy {
        self.hostname_policy
    }

    pub fn anchors(&self) -> &[CertificateDer<'static>] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// Exact match of a certificate against the anchor set
    pub fn is_pinned(&self, cert: &CertificateDer<'_>) -> bool {
        self.anchors.iter().any(|a| a.as_ref() == cert.as_ref())
    }

    /// Certificate verifier enforcing this policy
    pub fn verifier(&self) -> Result<Arc<PinnedCertVerifier>> {
        let provider = Arc::new(ring::default_provider());
        let inner = WebPkiServerVerifier::builder_with_provider(self.roots.clone(), provider)
            .build()
            .map_err(|e| OutreachError::Config(format!("Failed to build certificate verifier: {}", e)))?;

        Ok(Arc::new(PinnedCertVerifier {
            policy: self.clone(),
            inner,
        }))
    }

    /// TLS client configuration to hand to the HTTP client builder
    pub fn client_config(&self) -> Result<ClientConfig> {
        let provider = Arc::new(ring::default_provider());
        let verifier = self.verifier()?;

        let config = ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| OutreachError::Config(format!("TLS configuration error: {}", e)))?
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        Ok(config)
    }
}

/// Server certificate verifier backed by the pinned anchor set
#[derive(Debug)]
pub struct PinnedCertVerifier {
    policy: TrustPolicy,
    inner: Arc<WebPkiServerVerifier>,
}

impl ServerCertVerifier for PinnedCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        let result = self.inner.verify_server_cert(
            end_entity,
            intermediates,
            server_name,
            ocsp_response,
            now,
        );

        // The name check runs last, so a name mismatch means chain and validity passed
        let pinned_name_mismatch = matches!(
            result,
            Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
            ))
        ) && self.policy.hostname_policy == HostnamePolicy::AcceptPinned
            && self.policy.is_pinned(end_entity);

        if pinned_name_mismatch {
            tracing::debug!(
                server_name = ?server_name,
                "Peer presented a pinned certificate, skipping hostname check"
            );
            return Ok(ServerCertVerified::assertion());
        }

        result.inspect_err(|e| {
            tracing::warn!(
                server_name = ?server_name,
                error = %e,
                "Peer certificate rejected by pinned trust policy"
            );
        })
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
