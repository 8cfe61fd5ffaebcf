//! Token federation: the per-request bearer-credential gate.
//!
//! Every request runs a short state machine with two terminal states:
//! admitted (a [`SecurityContext`] is established and the downstream chain
//! runs exactly once) or rejected (one generic unauthorized response, chain
//! never runs). Checks are ordered cheapest-and-most-decisive first
//! (header presence, then token parse, then the authority's signature
//! verification, then two local comparisons) so obviously bad input never
//! reaches the authority.
//!
//! The decision logic lives in [`evaluate`] as a pure function of the
//! request facts; [`filter`] adapts it to the HTTP boundary.

pub mod authority;
pub mod filter;
pub mod token;

pub use authority::{HmacTokenAuthority, TokenAuthority};
pub use filter::{FederationState, federation_middleware};
pub use token::BearerToken;

const BEARER: &str = "Bearer ";

/// Why a request was rejected.
///
/// Internal diagnostics only: the HTTP boundary collapses every variant into
/// the same unauthorized response, so callers learn nothing about which
/// check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// No `Authorization` header, or not a bearer credential
    MissingCredential,
    /// The credential did not parse as a token
    MalformedToken,
    /// The authority reported the signature invalid
    BadSignature,
    /// The token's expiry instant is not in the future
    Expired,
    /// The token's audience does not match the request target
    AudienceMismatch,
}

impl RejectReason {
    /// Stable label for logs and metrics.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::MalformedToken => "malformed_token",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
            Self::AudienceMismatch => "audience_mismatch",
        }
    }
}

/// Terminal state of the federation state machine for one request.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    /// Forward the request with this security context attached
    Admitted(SecurityContext),
    /// Stop request processing with an unauthorized response
    Rejected(RejectReason),
}

/// Per-request carrier of the authenticated principal(s).
///
/// Created by the filter immediately before forwarding and scoped strictly
/// to that request's downstream processing: it travels as an explicit
/// request-local value (axum extensions), never as ambient thread state,
/// and is discarded when the request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityContext {
    principals: Vec<String>,
}

impl SecurityContext {
    fn from_token(token: &BearerToken) -> Self {
        Self {
            principals: vec![token.principal().to_string()],
        }
    }

    /// The primary principal, i.e. the token's subject.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.principals.first().map_or("", String::as_str)
    }

    /// All principals, primary first.
    #[must_use]
    pub fn principals(&self) -> &[String] {
        &self.principals
    }
}

/// Run the federation state machine over one request's facts.
///
/// `authorization` is the raw `Authorization` header value, if any;
/// `target_url` is the request's full target URL; `now_millis` is the
/// current instant in epoch milliseconds.
pub async fn evaluate(
    authorization: Option<&str>,
    target_url: &str,
    authority: &dyn TokenAuthority,
    now_millis: i64,
) -> Admission {
    let Some(wire) = authorization
        .and_then(|header| header.strip_prefix(BEARER).or_else(|| header.strip_prefix("bearer ")))
    else {
        return Admission::Rejected(RejectReason::MissingCredential);
    };

    let Ok(token) = BearerToken::parse(wire) else {
        return Admission::Rejected(RejectReason::MalformedToken);
    };

    if !authority.verify(&token).await {
        return Admission::Rejected(RejectReason::BadSignature);
    }

    if now_millis >= token.expires_at() {
        return Admission::Rejected(RejectReason::Expired);
    }

    if !audience_matches(token.audience(), target_url) {
        return Admission::Rejected(RejectReason::AudienceMismatch);
    }

    Admission::Admitted(SecurityContext::from_token(&token))
}

/// Case-insensitive substring containment of the audience claim in the
/// request's full target URL.
///
/// Deliberately permissive: one audience value is expected to name one
/// backend mount path (`webhdfs` matching `/webhdfs/v1/...`), not one exact
/// URL. Exact-match is a known hardening candidate: an audience value that
/// happens to be a substring of an unrelated URL would also match. A token
/// without an audience claim is never admitted.
fn audience_matches(audience: Option<&str>, target_url: &str) -> bool {
    audience.is_some_and(|aud| {
        !aud.is_empty() && target_url.to_lowercase().contains(&aud.to_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    const NOW: i64 = 1_700_000_000_000;
    const TEN_MINUTES: i64 = 10 * 60 * 1000;
    const TARGET: &str = "https://gateway.example.com:8443/webhdfs/v1/tmp?op=LISTSTATUS";

    struct StubAuthority(bool);

    #[async_trait]
    impl TokenAuthority for StubAuthority {
        async fn verify(&self, _token: &BearerToken) -> bool {
            self.0
        }
    }

    fn bearer(wire: &str) -> String {
        format!("Bearer {wire}")
    }

    fn valid_token() -> String {
        HmacTokenAuthority::new("secret").mint("guest", Some("webhdfs"), NOW + TEN_MINUTES)
    }

    #[tokio::test]
    async fn no_header_is_missing_credential() {
        let admission = evaluate(None, TARGET, &StubAuthority(true), NOW).await;
        assert_eq!(
            admission,
            Admission::Rejected(RejectReason::MissingCredential)
        );
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_missing_credential() {
        let admission = evaluate(
            Some("Basic Z3Vlc3Q6cGFzcw=="),
            TARGET,
            &StubAuthority(true),
            NOW,
        )
        .await;
        assert_eq!(
            admission,
            Admission::Rejected(RejectReason::MissingCredential)
        );
    }

    #[tokio::test]
    async fn garbage_token_is_malformed() {
        let admission = evaluate(
            Some("Bearer not-a-token"),
            TARGET,
            &StubAuthority(true),
            NOW,
        )
        .await;
        assert_eq!(admission, Admission::Rejected(RejectReason::MalformedToken));
    }

    #[tokio::test]
    async fn authority_refusal_is_bad_signature() {
        let admission = evaluate(
            Some(bearer(&valid_token()).as_str()),
            TARGET,
            &StubAuthority(false),
            NOW,
        )
        .await;
        assert_eq!(admission, Admission::Rejected(RejectReason::BadSignature));
    }

    #[tokio::test]
    async fn expired_token_is_rejected_before_audience() {
        let authority = HmacTokenAuthority::new("secret");
        let stale = authority.mint("guest", Some("webhdfs"), NOW - 1);
        let admission = evaluate(Some(bearer(&stale).as_str()), TARGET, &authority, NOW).await;
        assert_eq!(admission, Admission::Rejected(RejectReason::Expired));
    }

    #[tokio::test]
    async fn expiry_boundary_is_exclusive() {
        let authority = HmacTokenAuthority::new("secret");
        let boundary = authority.mint("guest", Some("webhdfs"), NOW);
        let admission = evaluate(Some(bearer(&boundary).as_str()), TARGET, &authority, NOW).await;
        assert_eq!(admission, Admission::Rejected(RejectReason::Expired));
    }

    #[tokio::test]
    async fn audience_absent_from_target_is_rejected() {
        let authority = HmacTokenAuthority::new("secret");
        let admission = evaluate(
            Some(bearer(&valid_token()).as_str()),
            "https://gateway.example.com:8443/hive",
            &authority,
            NOW,
        )
        .await;
        assert_eq!(
            admission,
            Admission::Rejected(RejectReason::AudienceMismatch)
        );
    }

    #[tokio::test]
    async fn matching_request_is_admitted_with_the_token_principal() {
        let authority = HmacTokenAuthority::new("secret");
        let admission = evaluate(Some(bearer(&valid_token()).as_str()), TARGET, &authority, NOW).await;
        let Admission::Admitted(context) = admission else {
            panic!("expected admission, got {admission:?}");
        };
        assert_eq!(context.primary(), "guest");
        assert_eq!(context.principals(), ["guest".to_string()]);
    }

    #[tokio::test]
    async fn audience_match_is_case_insensitive() {
        let authority = HmacTokenAuthority::new("secret");
        let shouting = authority.mint("guest", Some("WEBHDFS"), NOW + TEN_MINUTES);
        let admission = evaluate(Some(bearer(&shouting).as_str()), TARGET, &authority, NOW).await;
        assert!(matches!(admission, Admission::Admitted(_)));
    }

    #[tokio::test]
    async fn token_without_audience_is_rejected() {
        let authority = HmacTokenAuthority::new("secret");
        let aimless = authority.mint("guest", None, NOW + TEN_MINUTES);
        let admission = evaluate(Some(bearer(&aimless).as_str()), TARGET, &authority, NOW).await;
        assert_eq!(
            admission,
            Admission::Rejected(RejectReason::AudienceMismatch)
        );
    }
}
