//! Bearer credential wire format.
//!
//! Tokens travel as three dot-separated base64url (unpadded) segments:
//! `header.claims.signature`. The claims carry the subject principal
//! (`sub`), the intended audience (`aud`) and an absolute expiry instant in
//! epoch milliseconds (`exp`). Parsing makes no trust decision: signature
//! verification belongs to the [`TokenAuthority`](super::TokenAuthority),
//! and expiry/audience enforcement stays in the filter.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

/// Why a wire token could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum TokenParseError {
    /// The token is not three dot-separated segments.
    #[error("token is not three dot-separated segments")]
    Format,

    /// A segment is not valid unpadded base64url.
    #[error("token segment is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The claims segment is not the expected JSON document.
    #[error("token claims are not valid JSON: {0}")]
    Claims(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub(crate) sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) aud: Option<String>,
    pub(crate) exp: i64,
}

/// A parsed, not yet verified, bearer credential.
#[derive(Debug, Clone)]
pub struct BearerToken {
    claims: Claims,
    signing_input: String,
    signature: Vec<u8>,
}

impl BearerToken {
    /// Parse the wire form of a token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenParseError`] when the segment structure, encoding or
    /// claims document is malformed.
    pub fn parse(wire: &str) -> Result<Self, TokenParseError> {
        let mut segments = wire.split('.');
        let (Some(header), Some(claims), Some(signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(TokenParseError::Format);
        };

        // The header is opaque to the gateway but must still decode
        URL_SAFE_NO_PAD.decode(header)?;
        let claims_json = URL_SAFE_NO_PAD.decode(claims)?;
        let parsed: Claims = serde_json::from_slice(&claims_json)?;
        let signature = URL_SAFE_NO_PAD.decode(signature)?;

        Ok(Self {
            claims: parsed,
            signing_input: format!("{header}.{claims}"),
            signature,
        })
    }

    /// Subject identifier the token asserts.
    #[must_use]
    pub fn principal(&self) -> &str {
        &self.claims.sub
    }

    /// Intended recipient identifier, if the token carries one.
    #[must_use]
    pub fn audience(&self) -> Option<&str> {
        self.claims.aud.as_deref()
    }

    /// Absolute expiry instant, epoch milliseconds.
    #[must_use]
    pub fn expires_at(&self) -> i64 {
        self.claims.exp
    }

    /// The `header.claims` prefix the signature covers.
    #[must_use]
    pub fn signing_input(&self) -> &str {
        &self.signing_input
    }

    /// The decoded signature tag.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}
