//! Integration tests for the HTTP surface

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use leadflow_domain::now_millis;
use leadflow_server::{
    build_state,
    config::ServerConfig,
    handlers::{create_router, ErrorResponse, HealthCheckResponse, LeadListResponse, LeadResponse, SubmissionResponse},
};
use serde::de::DeserializeOwned;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt; // for oneshot

const HOUR_MS: u64 = 3600 * 1000;

fn create_test_app() -> Router {
    let state = build_state(&ServerConfig::default_test_config()).unwrap();
    create_router(state)
}

async fn send<T: DeserializeOwned>(app: &Router, request: Request<Body>) -> (StatusCode, T) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn qualified_submission() -> serde_json::Value {
    json!({
        "form_id": "contact",
        "field_values": { "budget": 5000, "email": "ada@example.com" },
        "utm_source": "google",
        "utm_campaign": "spring"
    })
}

async fn submit(app: &Router, body: serde_json::Value) -> (StatusCode, SubmissionResponse) {
    send(app, post_json("/submissions", body)).await
}

#[tokio::test]
async fn test_health_check_endpoint() {
    let app = create_test_app();

    let (status, health): (_, HealthCheckResponse) = send(&app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "healthy");
    assert_eq!(health.store, "ok");
}

#[tokio::test]
async fn test_submit_qualified_lead() {
    let app = create_test_app();

    let (status, response) = submit(&app, qualified_submission()).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(response.lead.score, 70);
    assert!(response.lead.is_mql);
    assert_eq!(response.lead.temperature, "hot");
    assert_eq!(response.lead.origin.name, "Google Ads");
    assert_eq!(response.lead.origin.source_type, "utm_automatic");
    assert_eq!(response.lead.origin.campaign.as_deref(), Some("spring"));
    assert_eq!(response.lead.stage_id, "new");
    assert_eq!(response.lead.location, "unknown");
    assert_eq!(response.lead.assigned_member_id.as_deref(), Some("alice"));
    assert_eq!(response.allocation, "assigned");
    assert!(!response.replayed);
    assert!(!response.requires_manual_intervention);
    assert_eq!(response.score_breakdown.len(), 2);
}

#[tokio::test]
async fn test_round_robin_over_http() {
    let app = create_test_app();

    let mut assigned = Vec::new();
    for _ in 0..4 {
        let (_, response) = submit(&app, qualified_submission()).await;
        assigned.push(response.lead.assigned_member_id.unwrap());
    }

    assert_eq!(assigned, vec!["alice", "bob", "alice", "bob"]);
}

#[tokio::test]
async fn test_replay_returns_same_lead() {
    let app = create_test_app();
    let id = "0b6f3c1e-6a0b-4c1e-9a59-3f1f3a7c2d10";

    let mut body = qualified_submission();
    body["id"] = json!(id);

    let (first_status, first) = submit(&app, body.clone()).await;
    let (second_status, second) = submit(&app, body).await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert!(second.replayed);
    assert_eq!(second.allocation, "replayed");
    assert_eq!(second.lead.id, first.lead.id);
    assert_eq!(second.lead.submission_id, id);

    // Only one rotation slot was consumed
    let (_, next) = submit(&app, qualified_submission()).await;
    assert_eq!(next.lead.assigned_member_id.as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_validation_errors() {
    let app = create_test_app();

    let (status, error): (_, ErrorResponse) = send(
        &app,
        post_json("/submissions", json!({ "form_id": "contact", "field_values": { "budget": 10 } })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error.details, vec!["required field missing: email"]);

    let (status, error): (_, ErrorResponse) =
        send(&app, post_json("/submissions", json!({ "form_id": "newsletter" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error.details, vec!["unknown form: newsletter"]);

    let (status, _): (_, ErrorResponse) = send(
        &app,
        post_json("/submissions", json!({ "id": "nope", "form_id": "contact" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, list): (_, LeadListResponse) = send(&app, get("/leads")).await;
    assert_eq!(list.count, 0);
}

#[tokio::test]
async fn test_get_lead_recomputes_temperature() {
    let app = create_test_app();
    let mut body = qualified_submission();
    body["timestamp"] = json!(now_millis() - 30 * HOUR_MS);

    let (_, created) = submit(&app, body).await;
    assert_eq!(created.lead.temperature, "hot");

    let (status, lead): (_, LeadResponse) = send(&app, get(&format!("/leads/{}", created.lead.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lead.id, created.lead.id);
    assert_eq!(lead.temperature, "cold");

    let (_, cold): (_, LeadListResponse) = send(&app, get("/leads?tier=cold")).await;
    assert_eq!(cold.count, 1);
    let (_, hot): (_, LeadListResponse) = send(&app, get("/leads?tier=hot&pipeline_id=sales")).await;
    assert_eq!(hot.count, 0);
}

#[tokio::test]
async fn test_list_filters_on_recomputed_tier() {
    let app = create_test_app();
    let mut body = qualified_submission();
    body["timestamp"] = json!(now_millis() - 100 * HOUR_MS);
    let (_, created) = submit(&app, body).await;
    assert_eq!(created.lead.temperature, "hot");

    // Stored tag is still hot; no read has refreshed it
    let (status, hot): (_, LeadListResponse) = send(&app, get("/leads?tier=hot")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(hot.count, 0);

    let (_, frozen): (_, LeadListResponse) = send(&app, get("/leads?tier=frozen&pipeline_id=sales")).await;
    assert_eq!(frozen.count, 1);
    assert_eq!(frozen.leads[0].id, created.lead.id);
    assert_eq!(frozen.leads[0].temperature, "frozen");
}

#[tokio::test]
async fn test_move_stage_rejects_earlier_time() {
    let app = create_test_app();
    let (_, created) = submit(&app, qualified_submission()).await;
    let uri = format!("/leads/{}/stage", created.lead.id);

    let (status, error): (_, ErrorResponse) = send(
        &app,
        post_json(&uri, json!({ "stage_id": "contacted", "at": created.lead.created_at - 5 * HOUR_MS })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error.error.contains("precedes"));

    let (_, lead): (_, LeadResponse) = send(&app, get(&format!("/leads/{}", created.lead.id))).await;
    assert_eq!(lead.stage_id, "new");
    assert_eq!(lead.current_stage_entry_time, created.lead.current_stage_entry_time);
}

#[tokio::test]
async fn test_get_unknown_lead() {
    let app = create_test_app();

    let (status, _): (_, ErrorResponse) = send(&app, get("/leads/0190a5b2-3c4d-7e8f-9a0b-1c2d3e4f5a6b")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _): (_, ErrorResponse) = send(&app, get("/leads/garbage")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_rejects_unknown_tier() {
    let app = create_test_app();

    let (status, _): (_, ErrorResponse) = send(&app, get("/leads?tier=lukewarm")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_move_stage() {
    let app = create_test_app();
    let (_, created) = submit(&app, qualified_submission()).await;
    let uri = format!("/leads/{}/stage", created.lead.id);
    let at = created.lead.created_at + HOUR_MS;

    let (status, moved): (_, LeadResponse) =
        send(&app, post_json(&uri, json!({ "stage_id": "contacted", "at": at }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved.stage_id, "contacted");
    assert_eq!(moved.current_stage_entry_time, at);
    assert_eq!(moved.initial_stage_entry_time, created.lead.initial_stage_entry_time);

    let (status, error): (_, ErrorResponse) = send(&app, post_json(&uri, json!({ "stage_id": "lost" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error.error.contains("lost"));

    let (status, _): (_, ErrorResponse) = send(
        &app,
        post_json(
            "/leads/0190a5b2-3c4d-7e8f-9a0b-1c2d3e4f5a6b/stage",
            json!({ "stage_id": "contacted" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let mut config = ServerConfig::default_test_config();
    config.server.database_path = dir.path().join("leadflow.db").to_str().unwrap().to_string();

    let lead_id = {
        let app = create_router(build_state(&config).unwrap());
        let (_, response) = submit(&app, qualified_submission()).await;
        assert_eq!(response.lead.assigned_member_id.as_deref(), Some("alice"));
        response.lead.id
    };

    // Re-seeding on start keeps the rotation cursor and the leads
    let app = create_router(build_state(&config).unwrap());
    let (status, _): (_, LeadResponse) = send(&app, get(&format!("/leads/{}", lead_id))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, response) = submit(&app, qualified_submission()).await;
    assert_eq!(response.lead.assigned_member_id.as_deref(), Some("bob"));
}
