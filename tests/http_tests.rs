//! Integration tests for the HTTP fetcher
//!
//! These tests use wiremock to serve a small directory over HTTP and run
//! the full pipeline against it end-to-end.

use nestcrawl::config::{Config, FetchConfig};
use nestcrawl::fetch::{FetchError, FetchSession, Fetcher, HttpFetcher};
use nestcrawl::pipeline::{StopPolicy, StopReason};
use nestcrawl::{PageCache, Pipeline};
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

async fn fetch(server: &MockServer, route: &str, config: FetchConfig) -> Result<String, FetchError> {
    let fetcher = HttpFetcher::new(config);
    let mut session = fetcher.open_session().await.unwrap();
    let url = Url::parse(&format!("{}{}", server.uri(), route)).unwrap();
    let result = session.fetch(&url).await;
    session.close().await;
    result
}

#[tokio::test]
async fn test_fetch_returns_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ca"))
        .and(header("user-agent", "nestcrawl-test/1.0"))
        .respond_with(html("<a class=\"link\" href=\"/ca/oakland\">Oakland</a>"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = FetchConfig {
        user_agent: "nestcrawl-test/1.0".to_string(),
        ..FetchConfig::default()
    };
    let body = fetch(&mock_server, "/ca", config).await.unwrap();

    assert!(body.contains("Oakland"));
}

#[tokio::test]
async fn test_not_found_is_transient() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let err = fetch(&mock_server, "/gone", FetchConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 404, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_fatal() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let err = fetch(&mock_server, "/broken", FetchConfig::default())
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 500, .. }));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html("<p>late</p>").set_delay(std::time::Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let config = FetchConfig {
        timeout_ms: Some(200),
        ..FetchConfig::default()
    };
    let err = fetch(&mock_server, "/slow", config).await.unwrap_err();

    assert!(matches!(err, FetchError::Timeout { .. }));
}

#[tokio::test]
async fn test_follows_redirect() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("<p>moved</p>"))
        .mount(&mock_server)
        .await;

    let body = fetch(&mock_server, "/old", FetchConfig::default())
        .await
        .unwrap();

    assert!(body.contains("moved"));
}

#[tokio::test]
async fn test_full_crawl_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/find-neighborhood/"))
        .respond_with(html(r#"<a class="link" href="/ca">California</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ca"))
        .respond_with(html(r#"<a class="link" href="ca/oakland">Oakland</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/ca/oakland"))
        .respond_with(html(
            r#"<section>
                <div><h2>Nearby neighborhoods</h2></div>
                <div>
                    <a href="/n/rockridge">Rockridge</a>
                    <a href="/n/temescal">Temescal</a>
                </div>
                <ul><li><a href="/n/elsewhere">Elsewhere</a></li></ul>
            </section>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/n/rockridge"))
        .respond_with(html(
            r#"<div><strong>1,203</strong><span>Residents</span></div>
               <div><strong>640</strong><span>Homeowners</span></div>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/n/temescal"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let dir = TempDir::new().unwrap();
    let output = dir.path().join("data.csv");
    let mut config = Config::default();
    config.crawler.index_url = format!("{}/find-neighborhood/", mock_server.uri());
    config.crawler.stop = StopPolicy::Exhausted;
    config.output.path = output.clone();

    let cache = PageCache::open(dir.path().join("cache")).unwrap();
    let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(config.fetch.clone()));
    let summary = Pipeline::new(config, fetcher, cache)
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(summary.stop_reason, StopReason::Drained);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.stats.fetches, 4);
    assert_eq!(summary.stats.transient_failures, 1);

    let written = std::fs::read_to_string(&output).unwrap();
    assert!(written.contains(&format!(
        "California,Oakland,Rockridge,\"1,203\",640,{}/n/rockridge",
        mock_server.uri()
    )));
    assert!(written.contains(&format!(
        "California,Oakland,Temescal,N/A,N/A,{}/n/temescal",
        mock_server.uri()
    )));
}
