//! # Signing Key Sources
//!
//! [`HttpCertificateSource`] fetches the notification service's signing
//! certificate over plain HTTP on first use and keeps the extracted RSA key
//! for the life of the process. There is no refresh or rotation.
//!
//! [`StaticKeySource`] serves a fixed key (tests, offline runs).

use crate::domain::errors::VerificationError;
use crate::ports::outbound::SigningKeySource;
use async_trait::async_trait;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::{debug, warn};
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

/// Well-known location of the signing certificate.
pub const SIGNING_CERT_URL: &str =
    "http://sns.us-east-1.amazonaws.com/SimpleNotificationService.pem";

/// Extract the RSA public key from a PEM-encoded X.509 certificate.
///
/// # Errors
///
/// `VerificationError::InvalidCertificate` if the PEM is not a certificate
/// or its key is not RSA.
pub fn public_key_from_certificate_pem(pem: &str) -> Result<RsaPublicKey, VerificationError> {
    let certificate = Certificate::from_pem(pem.as_bytes())
        .map_err(|e| VerificationError::InvalidCertificate(e.to_string()))?;
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| VerificationError::InvalidCertificate(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| VerificationError::InvalidCertificate(e.to_string()))
}

/// Certificate fetched over HTTP once, then cached.
pub struct HttpCertificateSource {
    client: reqwest::Client,
    url: String,
    key: OnceCell<RsaPublicKey>,
}

impl HttpCertificateSource {
    /// Source for the well-known certificate URL.
    #[must_use]
    pub fn new() -> Self {
        Self::with_url(SIGNING_CERT_URL)
    }

    #[must_use]
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            key: OnceCell::new(),
        }
    }

    /// Process-wide instance for the well-known URL.
    ///
    /// Every endpoint that verifies signatures shares it, so the certificate
    /// is fetched at most once per process.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        static SHARED: OnceLock<Arc<HttpCertificateSource>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::new())))
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether the key has been fetched already.
    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.key.initialized()
    }

    async fn fetch(&self) -> Result<RsaPublicKey, VerificationError> {
        debug!(url = %self.url, "Fetching signing certificate");
        let pem = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| VerificationError::KeyFetch(e.to_string()))?
            .text()
            .await
            .map_err(|e| VerificationError::KeyFetch(e.to_string()))?;
        public_key_from_certificate_pem(&pem)
    }
}

impl Default for HttpCertificateSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SigningKeySource for HttpCertificateSource {
    async fn signing_key(&self) -> Result<RsaPublicKey, VerificationError> {
        self.key
            .get_or_try_init(|| self.fetch())
            .await
            .cloned()
            .inspect_err(|e| warn!(url = %self.url, error = %e, "Signing certificate unavailable"))
    }
}

/// A fixed signing key.
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    key: RsaPublicKey,
}

impl StaticKeySource {
    #[must_use]
    pub fn new(key: RsaPublicKey) -> Self {
        Self { key }
    }
}

#[async_trait]
impl SigningKeySource for StaticKeySource {
    async fn signing_key(&self) -> Result<RsaPublicKey, VerificationError> {
        Ok(self.key.clone())
    }
}
