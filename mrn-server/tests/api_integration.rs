//! API integration tests for mrn-server.
//!
//! These drive the full router (extractors, handlers, error mapping) over an
//! in-memory patient store.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use mrn_core::{DuplicatePolicy, InMemoryPatientStore};
use mrn_server::{create_router, AppState, Config};

fn fixture_store() -> Arc<InMemoryPatientStore> {
    let patients = json!([
        {
            "id": "20000000-0000-4000-8000-000000000001",
            "medicalId": "ab12c",
            "name": {"given": ["John"], "family": "Doe"},
            "contact": [
                {"system": "email", "value": "john@example.com"},
                {"system": "phone", "value": "+1 555 0100"}
            ],
            "address": {"line": ["1 Main St"], "city": "Springfield", "state": "IL"},
            "updatedAt": "2025-05-01T08:00:00Z"
        },
        {
            "id": "20000000-0000-4000-8000-000000000002",
            "medicalId": "CD34E",
            "name": "Jane Roe",
            "contact": "[{\"system\":\"email\",\"value\":\"shared@example.com\"}]",
            "updatedAt": "2025-05-02T08:00:00Z"
        },
        {
            "id": "20000000-0000-4000-8000-000000000003",
            "medicalId": "FG56H",
            "name": "Jim Roe",
            "contact": "[{\"system\":\"email\",\"value\":\"shared@example.com\"}]",
            "updatedAt": "2025-05-03T08:00:00Z"
        }
    ]);
    Arc::new(InMemoryPatientStore::from_json(&patients.to_string()).unwrap())
}

fn create_test_app_with(store: Arc<InMemoryPatientStore>, config: Config) -> Router {
    create_router(AppState::new(store, config))
}

fn create_test_app() -> (Router, Arc<InMemoryPatientStore>) {
    let store = fixture_store();
    (create_test_app_with(store.clone(), Config::default()), store)
}

fn staff_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-caller-id", "staff-1")
        .header("x-caller-role", "staff");
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

// ============================================================================
// Health & Readiness Tests
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_ok() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["store_available"], true);
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_ready_reports_store_outage() {
    let (app, store) = create_test_app();
    store.set_available(false);

    let (status, json) = send(
        app,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["ready"], false);
}

// ============================================================================
// Resolve Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_resolve_by_medical_identifier() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        staff_request(
            "POST",
            "/patients/resolve",
            Some(json!({"medicalIdentifier": " Ab12c "})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["strategy"], "medical_id");
    let patient = &json["patient"];
    assert_eq!(patient["medicalIdentifier"], "AB12C");
    assert_eq!(patient["displayIdentifier"], "AB12C");
    assert_eq!(patient["fullName"], "John Doe");
    assert_eq!(patient["emailAddress"], "john@example.com");
    assert_eq!(patient["phoneNumber"], "+1 555 0100");
    assert!(json.get("duplicateWarning").is_none());
}

#[tokio::test]
async fn test_resolve_system_id_falls_back_to_medical_identifier() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        staff_request("POST", "/patients/resolve", Some(json!({"systemId": "cd34e"}))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["strategy"], "system_id_as_medical_id");
    assert_eq!(json["patient"]["fullName"], "Jane Roe");
}

#[tokio::test]
async fn test_resolve_shared_email_reports_duplicates() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        staff_request(
            "POST",
            "/patients/resolve",
            Some(json!({"emailAddress": "shared@example.com"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["strategy"], "email");
    // Most recently updated record wins.
    assert_eq!(json["patient"]["fullName"], "Jim Roe");
    assert_eq!(json["duplicateWarning"]["matchCount"], 2);
    assert_eq!(
        json["duplicateWarning"]["candidateIds"].as_array().unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_resolve_shared_email_rejected_by_policy() {
    let config = Config {
        duplicate_policy: DuplicatePolicy::Reject,
        ..Config::default()
    };
    let app = create_test_app_with(fixture_store(), config);

    let (status, json) = send(
        app,
        staff_request(
            "POST",
            "/patients/resolve",
            Some(json!({"emailAddress": "shared@example.com"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "AMBIGUOUS_MATCH");
    assert_eq!(json["candidateIds"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_resolve_unknown_identifier_is_not_found() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        staff_request(
            "POST",
            "/patients/resolve",
            Some(json!({"medicalIdentifier": "ZZ99Z"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_resolve_malformed_identifier_never_reaches_store() {
    let (app, store) = create_test_app();

    let (status, json) = send(
        app,
        staff_request(
            "POST",
            "/patients/resolve",
            Some(json!({"medicalIdentifier": "ABCDE"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_IDENTIFIER");
    assert_eq!(json["retryable"], false);
    assert_eq!(store.stats().total_lookups(), 0);
}

#[tokio::test]
async fn test_resolve_empty_query_is_rejected() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        staff_request("POST", "/patients/resolve", Some(json!({"systemId": "   "}))),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "INVALID_QUERY");
}

#[tokio::test]
async fn test_resolve_store_outage_is_retryable() {
    let (app, store) = create_test_app();
    store.set_available(false);

    let (status, json) = send(
        app,
        staff_request(
            "POST",
            "/patients/resolve",
            Some(json!({"medicalIdentifier": "AB12C"})),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["code"], "STORE_UNAVAILABLE");
    assert_eq!(json["retryable"], true);
}

// ============================================================================
// Caller Identity Tests
// ============================================================================

#[tokio::test]
async fn test_resolve_without_caller_is_unauthorized() {
    let (app, _) = create_test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/patients/resolve")
        .header("content-type", "application/json")
        .body(Body::from(json!({"medicalIdentifier": "AB12C"}).to_string()))
        .unwrap();
    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_patient_role_may_not_search() {
    let (app, store) = create_test_app();

    let request = Request::builder()
        .uri("/patients/search?q=roe")
        .header("x-caller-id", "patient-7")
        .header("x-caller-role", "patient")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(app, request).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "FORBIDDEN");
    assert_eq!(store.stats().search_text, 0);
}

// ============================================================================
// Search Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_search_sorts_by_name() {
    let (app, _) = create_test_app();

    let (status, json) = send(app, staff_request("GET", "/patients/search?q=roe", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);
    let names: Vec<_> = json["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["fullName"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, ["Jane Roe", "Jim Roe"]);
}

#[tokio::test]
async fn test_search_respects_limit() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        staff_request("GET", "/patients/search?q=roe&limit=1", None),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn test_blank_search_skips_store() {
    let (app, store) = create_test_app();

    let (status, json) = send(app, staff_request("GET", "/patients/search?q=%20", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 0);
    assert_eq!(store.stats().search_text, 0);
}

// ============================================================================
// Identifier Display Tests
// ============================================================================

#[tokio::test]
async fn test_identifier_display_forms() {
    let cases = [
        ("ab12c", "AB12C", true, false),
        ("ABCDE", "Invalid Format", false, true),
    ];
    for (raw, display, valid, placeholder) in cases {
        let (app, _) = create_test_app();
        let (status, json) = send(
            app,
            Request::builder()
                .uri(format!("/identifiers/{raw}/display"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["display"], display, "raw {raw}");
        assert_eq!(json["valid"], valid, "raw {raw}");
        assert_eq!(json["placeholder"], placeholder, "raw {raw}");
    }
}

#[tokio::test]
async fn test_identifier_display_derived_from_record_id() {
    let (app, _) = create_test_app();

    let (status, json) = send(
        app,
        Request::builder()
            .uri("/identifiers/550e8400-e29b-41d4-a716-446655440000/display")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["valid"], false);
    assert_eq!(json["derived"], true);
}
