use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;

use herald_core::testutil::MockFeedSource;
use herald_core::{IngestConfig, IngestService, MemoryStore};
use herald_server::routes;
use herald_server::state::AppState;

/// Router plus handles on its collaborators for assertions.
pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub source: MockFeedSource,
}

/// Build the app over an in-memory store and the given mock source.
pub fn setup_test_app(source: MockFeedSource) -> TestApp {
    let store = MemoryStore::new();
    let service = IngestService::new(source.clone(), store.clone(), IngestConfig::default());
    let router = routes::router(Arc::new(AppState::new(service)));

    TestApp {
        router,
        store,
        source,
    }
}

pub fn post_feed(feed_url: &str) -> Request<Body> {
    let body = serde_json::json!({ "feed_url": feed_url });
    Request::post("/v1/feeds")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
