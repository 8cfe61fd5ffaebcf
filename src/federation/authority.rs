//! Credential authority boundary.
//!
//! The authority answers exactly one question: is the signature over a
//! token's signing input valid? Expiry and audience checks stay in the
//! filter, so swapping authorities can never weaken them.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{KeyInit, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::token::{BearerToken, Claims};

type HmacSha256 = hmac::Hmac<Sha256>;

/// Verifies a bearer token's cryptographic signature.
#[async_trait]
pub trait TokenAuthority: Send + Sync {
    /// `true` when the signature over the token's signing input is valid.
    /// Signature validity only; never expiry, never audience.
    async fn verify(&self, token: &BearerToken) -> bool;
}

/// Authority backed by a single shared HMAC-SHA256 secret.
///
/// Suited to deployments where the gateway both mints and verifies its own
/// access tokens. Asymmetric authorities plug in through the same trait.
pub struct HmacTokenAuthority {
    mac: HmacSha256,
}

impl HmacTokenAuthority {
    /// Create an authority from a shared secret.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            mac: HmacSha256::new_from_slice(secret.as_ref())
                .expect("HMAC accepts keys of any length"),
        }
    }

    /// Mint a signed wire token. Used by token provisioning and tests.
    #[must_use]
    pub fn mint(&self, principal: &str, audience: Option<&str>, expires_at: i64) -> String {
        let claims = Claims {
            sub: principal.to_string(),
            aud: audience.map(str::to_string),
            exp: expires_at,
        };
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap_or_default());
        let signing_input = format!("{header}.{claims}");
        let tag = self.tag(signing_input.as_bytes());
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(tag))
    }

    fn tag(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

#[async_trait]
impl TokenAuthority for HmacTokenAuthority {
    async fn verify(&self, token: &BearerToken) -> bool {
        let expected = self.tag(token.signing_input().as_bytes());
        expected.as_slice().ct_eq(token.signature()).into()
    }
}
