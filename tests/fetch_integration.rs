//! Integration tests for the fetcher against mock HTTP servers.

use std::sync::Arc;
use std::time::Duration;

use pricewatch_core::fetch::{
    BROWSER_USER_AGENT, FetchError, Fetcher, FetcherOptions, PageSource, RateLimiter, RetryPolicy,
};
use pricewatch_core::matcher::Matcher;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_fetcher(max_attempts: u32) -> Fetcher {
    let options = FetcherOptions {
        retry_policy: RetryPolicy::new(
            max_attempts,
            Duration::from_millis(10),
            Duration::from_millis(50),
            2.0,
        ),
        ..FetcherOptions::default()
    };
    Fetcher::new(options, Arc::new(RateLimiter::disabled())).expect("client should build")
}

// ==================== Status handling ====================

#[tokio::test]
async fn test_get_returns_body_and_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/game/pokemon-base-set/charizard-4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/game/pokemon-base-set/charizard-4", server.uri());
    let page = fast_fetcher(3).get(&url).await.expect("fetch should succeed");

    assert_eq!(page.body, "<html>ok</html>");
    assert_eq!(page.url, url);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/game/removed"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let result = fast_fetcher(3)
        .get(&format!("{}/game/removed", server.uri()))
        .await;

    assert!(matches!(result, Err(FetchError::NotFound { .. })));
    assert!(result.is_err_and(|e| e.is_not_found()));
}

#[tokio::test]
async fn test_server_error_retried_until_attempts_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let result = fast_fetcher(3).get(&format!("{}/flaky", server.uri())).await;

    assert!(matches!(
        result,
        Err(FetchError::HttpStatus { status: 503, .. })
    ));
}

#[tokio::test]
async fn test_server_error_then_success_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/recovering"))
        .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
        .mount(&server)
        .await;

    let page = fast_fetcher(3)
        .get(&format!("{}/recovering", server.uri()))
        .await
        .expect("second attempt should succeed");
    assert_eq!(page.body, "recovered");
}

#[tokio::test]
async fn test_forbidden_is_permanent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let result = fast_fetcher(3).get(&format!("{}/blocked", server.uri())).await;
    assert!(matches!(
        result,
        Err(FetchError::HttpStatus { status: 403, .. })
    ));
}

// ==================== Request shape ====================

#[tokio::test]
async fn test_requests_carry_browser_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/identity"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    fast_fetcher(1)
        .get(&format!("{}/identity", server.uri()))
        .await
        .expect("fetch should succeed");

    let requests = server.received_requests().await.expect("recording is on");
    assert_eq!(requests.len(), 1);
    let header_text = |name: &str| {
        requests[0]
            .headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    assert_eq!(header_text("user-agent").as_deref(), Some(BROWSER_USER_AGENT));
    assert!(header_text("accept").is_some_and(|accept| accept.starts_with("text/html")));
    assert_eq!(header_text("accept-language").as_deref(), Some("en-US,en;q=0.9"));
}

#[tokio::test]
async fn test_post_form_sends_urlencoded_cursor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/console/pokemon-base-set"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("cursor=page%202"))
        .respond_with(ResponseTemplate::new(200).set_body_string("next page"))
        .expect(1)
        .mount(&server)
        .await;

    let page = fast_fetcher(1)
        .post_form(
            &format!("{}/console/pokemon-base-set", server.uri()),
            &[("cursor", "page 2")],
        )
        .await
        .expect("post should succeed");
    assert_eq!(page.body, "next page");
}

// ==================== Matching over HTTP ====================

#[tokio::test]
async fn test_search_redirect_resolves_to_canonical_detail_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search-products"))
        .and(query_param("q", "Charizard 4"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", "/game/pokemon-base-set/charizard-4?q=charizard"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/game/pokemon-base-set/charizard-4"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let source: Arc<dyn PageSource> = Arc::new(fast_fetcher(1));
    let matcher = Matcher::new(source, &server.uri()).expect("valid base");
    let url = matcher
        .resolve_item("Charizard", Some("4/102"), None)
        .await
        .expect("redirect should resolve");

    assert_eq!(url, format!("{}/game/pokemon-base-set/charizard-4", server.uri()));
}
