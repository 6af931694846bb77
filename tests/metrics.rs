// tests/metrics.rs
// One test per process: the Prometheus recorder is global.
mod common;

use axum::body::{self, Body};
use axum::http::Request;
use http::StatusCode;
use std::sync::Arc;
use tower::ServiceExt;

use common::{news, FakeConnector};
use hotspot_monitor::config::AppConfig;
use hotspot_monitor::ingest::types::{Connector, SocialPost};
use hotspot_monitor::metrics::Metrics;
use hotspot_monitor::{HotspotEngine, Region, Sources};

#[tokio::test]
async fn metrics_endpoint_exposes_engine_and_connector_series() {
    let metrics = Metrics::init(&AppConfig::default()).expect("first recorder install");
    assert!(Metrics::init(&AppConfig::default()).is_err(), "recorder is process-global");

    let engine = HotspotEngine::new(Sources {
        news: Some(FakeConnector::new(
            "news",
            vec![news("n1", "Missile test over the DMZ", Some(Region::Korea), 0.7)],
        )),
        social: vec![FakeConnector::<SocialPost>::failing("bluesky") as Arc<dyn Connector<SocialPost>>],
        ..Sources::default()
    });
    engine.update_scores(false).await.unwrap();
    engine.update_scores(false).await.unwrap();

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "engine_ticks_total",
        "engine_tick_ms",
        "connector_errors_total{source=\"bluesky\"}",
        "hotspot_region_score{region=\"korea\"}",
        "engine_tick_interval_secs 30",
        "news_cache_ttl_secs 180",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
