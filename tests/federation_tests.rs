//! End-to-end federation filter tests
//!
//! Runs the middleware inside a real axum router and asserts the two
//! boundary guarantees: rejected requests get one generic `401` and never
//! reach the downstream chain; admitted requests reach it exactly once with
//! the security context attached.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Extension, Router,
    body::Body,
    http::{Request, StatusCode, header},
    middleware,
    routing::get,
};
use portcullis::federation::{
    FederationState, HmacTokenAuthority, SecurityContext, federation_middleware,
};
use tower::ServiceExt;

const SECRET: &str = "integration-secret";
const HOST: &str = "gateway.example.com:8443";

fn now_millis() -> i64 {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);
    i64::try_from(elapsed.as_millis()).unwrap()
}

/// Router whose only handler counts invocations and echoes the principal.
fn guarded_router(hits: Arc<AtomicUsize>) -> Router {
    let state = Arc::new(FederationState::new(Arc::new(HmacTokenAuthority::new(
        SECRET,
    ))));

    let handler = move |Extension(context): Extension<SecurityContext>| {
        let hits = hits.clone();
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            context.primary().to_string()
        }
    };

    Router::new()
        .route("/webhdfs/v1/{*path}", get(handler.clone()))
        .route("/hive", get(handler))
        .layer(middleware::from_fn_with_state(state, federation_middleware))
}

fn webhdfs_request(authorization: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .uri("/webhdfs/v1/tmp?op=LISTSTATUS")
        .header(header::HOST, HOST);
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn missing_authorization_header_is_unauthorized_and_chain_never_runs() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = guarded_router(hits.clone());

    let response = router.oneshot(webhdfs_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers()[header::WWW_AUTHENTICATE],
        "Bearer"
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_token_is_admitted_and_chain_runs_exactly_once() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = guarded_router(hits.clone());

    let authority = HmacTokenAuthority::new(SECRET);
    let token = authority.mint("guest", Some("webhdfs"), now_millis() + 10 * 60 * 1000);

    let response = router
        .oneshot(webhdfs_request(Some(format!("Bearer {token}"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    // The downstream handler saw the token's principal in its context
    assert_eq!(&body[..], b"guest");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn expired_token_is_unauthorized_and_chain_never_runs() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = guarded_router(hits.clone());

    let authority = HmacTokenAuthority::new(SECRET);
    let token = authority.mint("guest", Some("webhdfs"), now_millis() - 10 * 60 * 1000);

    let response = router
        .oneshot(webhdfs_request(Some(format!("Bearer {token}"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn audience_mismatch_is_unauthorized_and_chain_never_runs() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = guarded_router(hits.clone());

    let authority = HmacTokenAuthority::new(SECRET);
    // Audience says webhdfs; the request goes to the hive mount
    let token = authority.mint("guest", Some("webhdfs"), now_millis() + 10 * 60 * 1000);

    let request = Request::builder()
        .uri("/hive")
        .header(header::HOST, HOST)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn tampered_signature_is_unauthorized_and_chain_never_runs() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = guarded_router(hits.clone());

    let authority = HmacTokenAuthority::new(SECRET);
    let token = authority.mint("guest", Some("webhdfs"), now_millis() + 10 * 60 * 1000);
    // Truncate the signature segment
    let tampered = &token[..token.len() - 4];

    let response = router
        .oneshot(webhdfs_request(Some(format!("Bearer {tampered}"))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejection_body_does_not_leak_the_reason() {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = guarded_router(hits);

    // Three different failure modes...
    let authority = HmacTokenAuthority::new(SECRET);
    let expired = authority.mint("guest", Some("webhdfs"), now_millis() - 1000);
    let requests = vec![
        webhdfs_request(None),
        webhdfs_request(Some("Bearer garbage".to_string())),
        webhdfs_request(Some(format!("Bearer {expired}"))),
    ];

    // ...one indistinguishable response
    let mut bodies = Vec::new();
    for request in requests {
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        bodies.push(body);
    }
    assert_eq!(bodies[0], bodies[1]);
    assert_eq!(bodies[1], bodies[2]);
}
