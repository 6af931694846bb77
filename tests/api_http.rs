// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot, with the
// engine wired to in-memory connectors.
//
// Covered:
// - GET /health
// - GET /api/v1/hotspot/{current,all,history}
// - GET /api/v1/regions, /api/v1/regions/{id}
// - GET /api/v1/markets/quotes

mod common;

use std::sync::Arc;

use common::{news, FakeConnector};
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use hotspot_monitor::ingest::types::{Connector, NewsItem, Quote, SocialPost};
use hotspot_monitor::{create_router, AppState, HotspotEngine, Region, Sources};

const BODY_LIMIT: usize = 1024 * 1024;

fn engine() -> Arc<HotspotEngine> {
    let items: Vec<NewsItem> = vec![
        news("n1", "BREAKING: missile strike near Tehran", Some(Region::Iran), 0.9),
        news("n2", "Iran nuclear talks stall", Some(Region::Iran), 0.8),
    ];
    Arc::new(HotspotEngine::new(Sources {
        news: Some(FakeConnector::new("news", items)),
        social: vec![FakeConnector::<SocialPost>::new("social", vec![]) as Arc<dyn Connector<SocialPost>>],
        ..Sources::default()
    }))
}

fn test_router() -> Router {
    create_router(AppState::new(engine()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Json) {
    let (status, bytes) = get(app, uri).await;
    let v = serde_json::from_slice(&bytes).expect("json body");
    (status, v)
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let (status, bytes) = get(test_router(), "/health").await;
    assert_eq!(status, StatusCode::OK, "health should be 200");
    assert_eq!(String::from_utf8(bytes).unwrap().trim(), "OK");
}

#[tokio::test]
async fn current_hotspot_returns_score_fields() {
    let (status, v) = get_json(test_router(), "/api/v1/hotspot/current").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(v["region_id"], "iran");
    assert_eq!(v["name"], "Iran");
    assert!(v["name_zh"].is_string());
    let total = v["total_score"].as_f64().expect("total_score");
    assert!((0.0..=100.0).contains(&total));
    assert!(["low", "elevated", "high", "critical"].contains(&v["alert_level"].as_str().unwrap()));
    for key in [
        "news_velocity",
        "social_volume",
        "google_trends",
        "sentiment_shift",
        "prediction_volatility",
        "market_movement",
        "event_triggers",
    ] {
        assert!(v["factors"][key].is_number(), "factor {key} missing");
    }
    assert!(v["last_updated"].is_string());
}

#[tokio::test]
async fn current_hotspot_without_any_source_is_503() {
    let app = create_router(AppState::new(Arc::new(HotspotEngine::new(Sources::default()))));
    let (status, v) = get_json(app, "/api/v1/hotspot/current").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(v["error"], "No hotspot data available");
}

#[tokio::test]
async fn all_lists_every_region() {
    let (status, v) = get_json(test_router(), "/api/v1/hotspot/all?force=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["current_hotspot"], "iran");
    let regions = v["regions"].as_object().expect("regions map");
    assert_eq!(regions.len(), 5);
    for r in Region::ALL {
        assert_eq!(regions[r.id()]["region_id"], r.id());
    }
    assert!(v["timestamp"].is_string());
}

#[tokio::test]
async fn history_honours_limit() {
    let engine = engine();
    for _ in 0..5 {
        engine.update_scores(false).await.unwrap();
    }
    let app = create_router(AppState::new(engine));

    let (status, v) = get_json(app.clone(), "/api/v1/hotspot/history?limit=3").await;
    assert_eq!(status, StatusCode::OK);
    let history = v["history"].as_array().expect("history array");
    assert_eq!(history.len(), 3);
    assert_eq!(history[0]["tick"], 3);
    assert_eq!(history[2]["tick"], 5);
    assert_eq!(history[2]["hotspot"], "iran");
    assert_eq!(history[2]["scores"].as_object().unwrap().len(), 5);

    // history reads never trigger a tick
    let (_, v) = get_json(app, "/api/v1/hotspot/history").await;
    assert_eq!(v["history"].as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn regions_catalogue_and_lookup() {
    let (status, v) = get_json(test_router(), "/api/v1/regions").await;
    assert_eq!(status, StatusCode::OK);
    let list = v.as_array().expect("region list");
    assert_eq!(list.len(), 5);
    assert_eq!(list[0]["id"], "iran");
    assert_eq!(list[4]["id"], "korea");

    let (status, v) = get_json(test_router(), "/api/v1/regions/taiwan-strait").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["id"], "taiwan-strait");
    assert!(v["keywords"].as_array().is_some_and(|k| !k.is_empty()));

    let (status, v) = get_json(test_router(), "/api/v1/regions/atlantis").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(v["error"].is_string());
}

#[tokio::test]
async fn quotes_need_a_configured_board() {
    let (status, _) = get_json(test_router(), "/api/v1/markets/quotes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let failing = FakeConnector::<Quote>::failing("defense_stocks");
    let app = create_router(AppState::new(engine()).with_quotes(failing));
    let (status, v) = get_json(app, "/api/v1/markets/quotes").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(v["error"], "quotes unavailable");
}
