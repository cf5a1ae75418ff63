//! Seam to the token verification layer.
//!
//! Signature, issuer, audience and expiry checks belong to the deployment's
//! verifier; this crate only consumes the resulting claim set.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

use keygate_auth::RawClaims;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token rejected: {0}")]
    Rejected(String),
}

/// Verifies a bearer token and returns its claim set.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<RawClaims, VerifyError>;
}

/// Decodes a compact JWT payload WITHOUT checking its signature.
///
/// Local development only; the binary refuses to use it unless explicitly
/// enabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnverifiedDecoder;

impl TokenVerifier for UnverifiedDecoder {
    fn verify(&self, token: &str) -> Result<RawClaims, VerifyError> {
        let mut parts = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(VerifyError::Malformed("expected three dot-separated segments".into()));
        };

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .map_err(|e| VerifyError::Malformed(format!("payload is not base64url: {e}")))?;

        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_slice(&bytes)
            .map_err(|e| VerifyError::Malformed(format!("payload is not a JSON object: {e}")))?;

        Ok(RawClaims::from(map))
    }
}
