use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use listing_monitor::fetch::{FetchError, HttpFetcher, PageFetcher};
use listing_monitor::parsers::AvitoExtractor;
use listing_monitor::tracker::{AttemptFailure, RetryPolicy, SnapshotError, SnapshotFetcher};
use listing_monitor::utils::http::{create_client, DEFAULT_USER_AGENT};

const RESULTS_PAGE: &str = r#"
    <html><body>
      <span data-marker="page-title/count">2</span>
      <div data-marker="item">
        <a data-marker="item-title" href="/moskva/velosipedy/bmx_1">BMX</a>
        <span data-marker="item-price">15 000 ₽</span>
      </div>
      <div data-marker="item">
        <a data-marker="item-title" href="/moskva/velosipedy/road_2">Road bike</a>
      </div>
    </body></html>
"#;

fn fetcher() -> HttpFetcher {
    HttpFetcher::new(create_client(DEFAULT_USER_AGENT, Duration::from_secs(5)).unwrap())
}

fn snapshots(server: &MockServer) -> SnapshotFetcher {
    let extractor = AvitoExtractor::with_base_url(&server.uri()).unwrap();
    SnapshotFetcher::new(
        Arc::new(fetcher()),
        Arc::new(extractor),
        RetryPolicy {
            max_retries: 2,
            retry_delay: Duration::ZERO,
        },
    )
}

#[tokio::test]
async fn successful_fetch_returns_markup() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moskva/velosipedy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .mount(&server)
        .await;

    let url = format!("{}/moskva/velosipedy", server.uri());
    let page = fetcher().fetch(&url).await.unwrap();

    assert_eq!(page.final_url, url);
    assert!(page.html.contains("data-marker=\"item\""));
}

#[tokio::test]
async fn forbidden_is_reported_as_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/moskva/velosipedy", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Blocked { .. }), "{err:?}");
}

#[tokio::test]
async fn server_error_is_reported_as_network_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = fetcher()
        .fetch(&format!("{}/moskva/velosipedy", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Network { .. }), "{err:?}");
}

#[tokio::test]
async fn snapshot_is_extracted_from_live_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moskva/velosipedy"))
        .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
        .expect(1)
        .mount(&server)
        .await;

    let snapshot = snapshots(&server)
        .fetch_snapshot(&format!(
            "{}/moskva/velosipedy?context=H4sIAAAA&q=bmx",
            server.uri()
        ))
        .await
        .unwrap();

    let urls: Vec<_> = snapshot.listings.iter().map(|l| l.url.clone()).collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/moskva/velosipedy/bmx_1", server.uri()),
            format!("{}/moskva/velosipedy/road_2", server.uri()),
        ]
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), Some("q=bmx"));
}

#[tokio::test]
async fn redirect_to_block_page_exhausts_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/moskva/velosipedy"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", "/blocked?reason=ip"),
        )
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blocked"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>Access restricted</html>"))
        .mount(&server)
        .await;

    let err = snapshots(&server)
        .fetch_snapshot(&format!("{}/moskva/velosipedy", server.uri()))
        .await
        .unwrap_err();

    match err {
        SnapshotError::Exhausted { attempts, last, .. } => {
            assert_eq!(attempts, 2);
            assert!(matches!(last, AttemptFailure::Blocked(_)), "{last:?}");
        }
        other => panic!("unexpected error: {other}"),
    }
}
