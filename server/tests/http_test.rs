//! HTTP endpoint tests against the in-memory data service.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tci_live_engine::Record;
use tci_live_server::live::LiveOptions;
use tci_live_server::source::MemoryDataService;
use tci_live_server::{app, AppState};
use tower::ServiceExt;

fn company(id: &str, ticker: &str, score: f64) -> Record {
    Record::new(
        id,
        json!({
            "name": format!("{} Corp", ticker),
            "ticker": ticker,
            "sector": "Technology",
            "tci_score": score,
            "environment_score": 70.0,
            "social_score": 65.5,
            "governance_score": 80.0,
            "fairness_score": 60.0,
            "confidence_level": 0.85,
            "last_updated": "2024-01-15T10:30:00Z"
        }),
    )
}

fn claim(id: &str, company_id: &str, status: &str, created_at: &str) -> Record {
    Record::new(
        id,
        json!({
            "company_id": company_id,
            "claim_text": "Net zero operations by 2030",
            "pillar": "Environment",
            "status": status,
            "confidence": 0.7,
            "created_at": created_at
        }),
    )
}

fn seeded() -> Arc<MemoryDataService> {
    let source = Arc::new(MemoryDataService::new());
    source.seed(
        "companies",
        vec![company("c-1", "TSLA", 76.2), company("c-2", "MSFT", 81.0)],
    );
    source.seed(
        "claims",
        vec![
            claim("k-1", "c-1", "Supporting", "2024-01-10T00:00:00Z"),
            claim("k-2", "c-1", "Contradicting", "2024-01-12T00:00:00Z"),
            claim("k-3", "c-2", "Neutral", "2024-01-11T00:00:00Z"),
            claim("k-4", "c-1", "Supporting", "2024-01-11T00:00:00Z"),
        ],
    );
    source
}

fn state(source: Arc<MemoryDataService>) -> AppState {
    AppState::new(source, LiveOptions::default())
}

async fn get(state: AppState, uri: &str) -> (StatusCode, Value) {
    let response = app(state)
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(state(seeded()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeSessions"], 0);
}

#[tokio::test]
async fn test_companies_sorted_by_score() {
    let (status, body) = get(state(seeded()), "/companies").await;
    assert_eq!(status, StatusCode::OK);

    let tickers: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["ticker"].as_str().unwrap())
        .collect();
    assert_eq!(tickers, vec!["MSFT", "TSLA"]);
}

#[tokio::test]
async fn test_company_detail() {
    let (status, body) = get(state(seeded()), "/companies/c-1").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(body["company"]["ticker"], "TSLA");
    let claim_ids: Vec<&str> = body["claims"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(claim_ids, vec!["k-2", "k-4", "k-1"]);
    assert_eq!(
        body["tally"],
        json!({"supporting": 2, "contradicting": 1, "neutral": 0})
    );
}

#[tokio::test]
async fn test_unknown_company_is_not_found() {
    let (status, body) = get(state(seeded()), "/companies/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_fetch_failure_is_bad_gateway() {
    let source = seeded();
    source.fail_next_fetch("upstream timeout");

    let (status, body) = get(state(source), "/companies").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["details"], "upstream timeout");
}

#[tokio::test]
async fn test_sessions_listed() {
    let state = state(seeded());
    let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
    let session_id = state.sessions.register("claims-c-1".to_string(), tx);

    let (status, body) = get(state.clone(), "/sessions").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], session_id.as_str());
    assert_eq!(body[0]["scope"], "claims-c-1");
    assert!(body[0]["connectedAt"].is_string());

    let (status, body) = get(state.clone(), &format!("/sessions/{}", session_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scope"], "claims-c-1");

    let (status, _) = get(state, "/sessions/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_over_tcp() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app(state(seeded()));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::new();

    let detail: Value = client
        .get(format!("http://{}/companies/c-2", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(detail["company"]["ticker"], "MSFT");
    assert_eq!(detail["tally"]["neutral"], 1);

    // Bad scopes are rejected before the upgrade
    let response = client
        .get(format!("http://{}/ws?resource=claims", addr))
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
}
