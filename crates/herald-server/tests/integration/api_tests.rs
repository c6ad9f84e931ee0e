use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use herald_core::AppError;
use herald_core::testutil::{MockFeedSource, status_fetch, valid_fetch};

use crate::integration::common::{json_body, post_feed, setup_test_app};

const FEED_URL: &str = "http://example.org/rss";

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app(MockFeedSource::new(valid_fetch()));

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn create_feed_returns_201() {
    let app = setup_test_app(MockFeedSource::new(valid_fetch()));

    let response = app.router.oneshot(post_feed(FEED_URL)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);

    let json = json_body(response).await;
    assert_eq!(json["feed_url"], FEED_URL);
    assert_eq!(json["message"], "RSS Feed successfully was created");
    assert_eq!(json["rss_feed"]["title"], "Sample Feed");
    assert_eq!(json["rss_feed"]["feed_url"], FEED_URL);
    assert_eq!(json["rss_feed"]["last_status"], 200);
    assert_eq!(json["rss_feed"]["number_of_errors"], 0);
    assert_eq!(json["rss_feed"]["is_active"], true);

    let feeds = app.store.feeds().await;
    assert_eq!(feeds.len(), 1);
    assert_eq!(app.store.entries_for(feeds[0].id).await.len(), 1);
}

#[tokio::test]
async fn repeated_create_reuses_feed() {
    let app = setup_test_app(MockFeedSource::new(valid_fetch()));

    let first = app
        .router
        .clone()
        .oneshot(post_feed(FEED_URL))
        .await
        .unwrap();
    let first = json_body(first).await;

    let second = app
        .router
        .clone()
        .oneshot(post_feed(FEED_URL))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CREATED);
    let second = json_body(second).await;

    assert_eq!(first["rss_feed"]["id"], second["rss_feed"]["id"]);
    let feeds = app.store.feeds().await;
    assert_eq!(feeds.len(), 1);
    assert_eq!(app.store.entries_for(feeds[0].id).await.len(), 1);
}

#[tokio::test]
async fn non_200_source_returns_400() {
    let app = setup_test_app(MockFeedSource::new(status_fetch(404, "text/html")));

    let response = app.router.oneshot(post_feed(FEED_URL)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = json_body(response).await;
    assert_eq!(json["feed_url"], FEED_URL);
    assert_eq!(json["message"], "RSS Feed URL is invalid");
    assert!(json["rss_feed"].is_null());
    assert!(app.store.feeds().await.is_empty());
}

#[tokio::test]
async fn non_xml_content_type_returns_400() {
    let app = setup_test_app(MockFeedSource::new(status_fetch(200, "application/json")));

    let response = app.router.oneshot(post_feed(FEED_URL)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.store.feeds().await.is_empty());
}

#[tokio::test]
async fn unreachable_source_returns_400() {
    let app = setup_test_app(MockFeedSource::with_error(AppError::FetchError(
        "Connection failed".into(),
    )));

    let response = app.router.oneshot(post_feed(FEED_URL)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert!(json["rss_feed"].is_null());
}

#[tokio::test]
async fn malformed_url_is_rejected_without_fetching() {
    let app = setup_test_app(MockFeedSource::new(valid_fetch()));

    let response = app
        .router
        .clone()
        .oneshot(post_feed("not a url"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["feed_url"], "not a url");
    assert!(app.source.requested_urls().is_empty());
}

#[tokio::test]
async fn openapi_document_lists_feed_route() {
    let app = setup_test_app(MockFeedSource::new(valid_fetch()));

    let response = app
        .router
        .oneshot(
            Request::get("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert!(json["paths"]["/v1/feeds"]["post"].is_object());
    assert!(json["paths"]["/health"]["get"].is_object());
}
