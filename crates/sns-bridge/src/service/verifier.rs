//! # Signature Verifier
//!
//! Checks a notification's `Signature` (base64, SHA1withRSA, PKCS#1 v1.5)
//! against the envelope's canonical string using the service signing key.
//!
//! ## Security Notes
//!
//! - Any failure (bad base64, key unavailable, mismatch) means "not
//!   verified"; nothing is propagated
//! - The key source decides caching; the HTTP source fetches once per process

use crate::domain::envelope::NotificationEnvelope;
use crate::domain::errors::VerificationError;
use crate::ports::outbound::SigningKeySource;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::Pkcs1v15Sign;
use sha1::{Digest, Sha1};
use std::sync::Arc;
use tracing::debug;

/// Verifies notification signatures.
#[derive(Clone)]
pub struct SignatureVerifier {
    keys: Arc<dyn SigningKeySource>,
}

impl SignatureVerifier {
    pub fn new(keys: Arc<dyn SigningKeySource>) -> Self {
        Self { keys }
    }

    /// `true` only if the signature matches the envelope's canonical string.
    pub async fn verify(&self, envelope: &NotificationEnvelope) -> bool {
        match self.try_verify(envelope).await {
            Ok(()) => true,
            Err(e) => {
                debug!(message_id = %envelope.message_id(), reason = %e, "Signature rejected");
                false
            }
        }
    }

    /// Like [`verify`](Self::verify), with the reason for a failure.
    ///
    /// # Errors
    ///
    /// The `VerificationError` explaining why the envelope is not authentic.
    pub async fn try_verify(
        &self,
        envelope: &NotificationEnvelope,
    ) -> Result<(), VerificationError> {
        let signature = STANDARD
            .decode(envelope.signature())
            .map_err(|e| VerificationError::SignatureEncoding(e.to_string()))?;
        let key = self.keys.signing_key().await?;
        let digest = Sha1::digest(envelope.canonical_bytes());
        key.verify(Pkcs1v15Sign::new::<Sha1>(), &digest, &signature)
            .map_err(|_| VerificationError::Mismatch)
    }
}
