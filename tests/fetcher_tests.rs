mod common;

use common::*;
use url::Url;
use url_unfurl::{
    AddressFilter, FetchOutcome, FetchState, PreviewError, RedirectInterceptor, SafeDialer,
    DEFAULT_MAX_BINARY_BODY_SIZE, DEFAULT_MAX_HTML_BODY_SIZE,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetch(url: &str) -> url_unfurl::FetchedResource {
    let resolver = loopback_resolver();
    let url = Url::parse(url).unwrap();
    let mut state = FetchState::new();

    match resolver
        .fetcher()
        .fetch_url(&url, &mut state, &RedirectInterceptor::passthrough())
        .await
        .unwrap()
    {
        FetchOutcome::Fetched(resource) => resource,
        FetchOutcome::ShortCircuit(short) => panic!("unexpected short-circuit at {}", short.url),
    }
}

#[tokio::test]
async fn test_html_body_is_capped() {
    let server = MockServer::start().await;
    let body = format!("<html><title>Long</title>{}</html>", "a".repeat(80_000));
    Mock::given(method("GET"))
        .and(path("/long"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "text/html"),
        )
        .mount(&server)
        .await;

    let resource = fetch(&page_url(&server, "/long")).await;
    assert_eq!(resource.body.len(), DEFAULT_MAX_HTML_BODY_SIZE);
    assert_eq!(resource.status, 200);
    assert_eq!(resource.content_type, "text/html");
}

#[tokio::test]
async fn test_binary_body_is_capped() {
    let server = MockServer::start().await;
    let mut body = png_header(100, 100);
    body.resize(20_000, 0);
    Mock::given(method("GET"))
        .and(path("/big.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(body, "image/png"),
        )
        .mount(&server)
        .await;

    let resource = fetch(&page_url(&server, "/big.png")).await;
    assert_eq!(resource.body.len(), DEFAULT_MAX_BINARY_BODY_SIZE);
}

#[tokio::test]
async fn test_declared_type_picks_the_cap() {
    let server = MockServer::start().await;
    let body = format!("<html><title>Mislabelled</title>{}</html>", "b".repeat(10_000));
    Mock::given(method("GET"))
        .and(path("/mislabelled.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "image/png"))
        .mount(&server)
        .await;

    let resource = fetch(&page_url(&server, "/mislabelled.png")).await;
    assert_eq!(resource.content_type, "image/png");
    assert_eq!(resource.body.len(), DEFAULT_MAX_BINARY_BODY_SIZE);
    assert_eq!(url_unfurl::sniff::sniff_content_type(&resource.body), url_unfurl::sniff::TEXT_HTML);
}

#[tokio::test]
async fn test_request_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("accept-language", "en-us"))
        .and(header("user-agent", url_unfurl::DEFAULT_USER_AGENT))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let resource = fetch(&page_url(&server, "/")).await;
    assert_eq!(resource.status, 204);
    assert!(resource.body.is_empty());
}

#[tokio::test]
async fn test_redirects_are_counted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(303).insert_header("location", "/b"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let resolver = loopback_resolver();
    let url = Url::parse(&page_url(&server, "/a")).unwrap();
    let mut state = FetchState::new();

    let outcome = resolver
        .fetcher()
        .fetch_url(&url, &mut state, &RedirectInterceptor::passthrough())
        .await
        .unwrap();

    assert!(matches!(outcome, FetchOutcome::Fetched(r) if r.final_url.path() == "/b"));
    assert_eq!(state.requests(), 2);
}

#[tokio::test]
async fn test_dial_through_filter() {
    let server = MockServer::start().await;
    let port = server.address().port();

    let open = SafeDialer::new(
        AddressFilter::from_cidrs::<&str>(&[], &["127.0.0.0/8"]).unwrap(),
        StaticLookup::loopback(),
    );
    let stream = open.dial(&format!("example.com:{port}")).await.unwrap();
    assert_eq!(stream.peer_addr().unwrap(), *server.address());

    let strict = SafeDialer::new(AddressFilter::default(), StaticLookup::loopback());
    assert!(matches!(
        strict.dial(&format!("example.com:{port}")).await,
        Err(PreviewError::AllBlacklisted(host)) if host == "example.com"
    ));
}
