// tests/api.rs
//
// End-to-end checks of the HTTP surface against an engine with no usable
// upstream (no API key, no auxiliary feeds), i.e. the fully degraded path.
// Everything here must still answer 200 with non-empty data.

use std::sync::Arc;

use agri_price_engine::routes::routes;
use agri_price_engine::services::aggregate::PriceEngine;
use agri_price_engine::services::cache::PriceCache;
use agri_price_engine::services::enam::EnamClient;

fn degraded_engine() -> Arc<PriceEngine> {
    let enam = EnamClient::new(None, "http://127.0.0.1:0").expect("client");
    Arc::new(PriceEngine::new(
        PriceCache::default(),
        Arc::new(enam),
        vec![],
    ))
}

#[tokio::test]
async fn prices_route_answers_with_synthetic_data_when_upstream_is_dead() {
    let api = routes(degraded_engine());

    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/prices/Punjab/Wheat?limit=3")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 3);
    assert_eq!(body["data"].as_array().unwrap().len(), 3);
    assert_eq!(body["metadata"]["fallback"]["used"], true);
    assert_eq!(body["metadata"]["fallback"]["records"], 3);
    assert_eq!(body["metadata"]["enam"]["attempted"], true);
    assert!(body["metadata"]["enam"]["error"].is_string());
    assert_eq!(body["metadata"]["requested"]["limit"], 3);
    assert_eq!(body["metadata"]["requested"]["region"], "Punjab");
    assert_eq!(body["metadata"]["requested"]["commodity"], "Wheat");
    let sources: Vec<&str> = body["sources"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert!(sources.contains(&"Synthetic Baseline"));
}

#[tokio::test]
async fn limit_is_clamped_and_default_applied() {
    let api = routes(degraded_engine());

    // out-of-range limit clamps to 20
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/prices/Punjab/Wheat?limit=500")
        .reply(&api)
        .await;
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["metadata"]["requested"]["limit"], 20);
    assert_eq!(body["data"].as_array().unwrap().len(), 20);

    // missing limit falls back to the default
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/prices/Punjab/Wheat")
        .reply(&api)
        .await;
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["metadata"]["requested"]["limit"], 5);
}

#[tokio::test]
async fn malformed_limit_is_rejected_with_a_400() {
    let api = routes(degraded_engine());

    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/prices/Punjab/Wheat?limit=abc")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert!(body["error"].as_str().unwrap().contains("limit"));

    // an empty limit falls back to the default instead of erroring
    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/prices/Punjab/Wheat?limit=")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn record_shape_matches_the_contract() {
    let api = routes(degraded_engine());

    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/prices/Punjab/Wheat?limit=2")
        .reply(&api)
        .await;
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();

    for rec in body["data"].as_array().unwrap() {
        assert!(rec["price"].as_f64().unwrap() > 0.0);
        assert_eq!(rec["unit"], "per quintal");
        assert!(matches!(
            rec["trend"].as_str().unwrap(),
            "up" | "down" | "stable"
        ));
        assert!(rec["change"].as_f64().unwrap() >= 0.0);
        assert!(!rec["market"].as_str().unwrap().is_empty());
        assert!(!rec["date"].as_str().unwrap().is_empty());
    }
}

#[tokio::test]
async fn health_route_reports_cache_size() {
    let api = routes(degraded_engine());

    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/health")
        .reply(&api)
        .await;

    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["cache_entries"], 0);
}

#[tokio::test]
async fn unknown_route_is_a_404() {
    let api = routes(degraded_engine());

    let resp = warp::test::request()
        .method("GET")
        .path("/api/v1/nope")
        .reply(&api)
        .await;
    assert_eq!(resp.status(), 404);
}
