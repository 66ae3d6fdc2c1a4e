use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_utils::test_utils::TestConfig;
use triage_cell::router::triage_routes;

async fn create_test_app() -> (Router, MockServer) {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/triage_assessments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_url(&mock_server.uri());
    (triage_routes(config.to_arc()), mock_server)
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn symptom_check(payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/symptom-check")
        .header("Content-Type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn breathing_difficulty_is_an_emergency() {
    let (app, _server) = create_test_app().await;

    let response = app
        .oneshot(symptom_check(json!({"symptoms": ["difficulty breathing"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["triage"]["score"], 85);
    assert_eq!(body["triage"]["red_flag"], true);
    assert_eq!(body["triage"]["tier"], "urgent");
    assert_eq!(
        body["triage"]["recommendation"],
        "Seek immediate emergency dental care"
    );
}

#[tokio::test]
async fn mild_discomfort_is_routine() {
    let (app, _server) = create_test_app().await;

    let response = app
        .oneshot(symptom_check(json!({
            "symptoms": ["mild discomfort"],
            "severity": "mild"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["triage"]["score"], 10);
    assert_eq!(body["triage"]["red_flag"], false);
    assert_eq!(body["triage"]["tier"], "low");
}

#[tokio::test]
async fn prolonged_severe_pain_escalates() {
    let (app, _server) = create_test_app().await;

    let response = app
        .oneshot(symptom_check(json!({
            "symptoms": ["severe tooth pain"],
            "severity": "severe",
            "duration": "3"
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert!(body["triage"]["score"].as_i64().unwrap() >= 70);
    assert_eq!(body["triage"]["red_flag"], true);
    assert_eq!(body["triage"]["tier"], "urgent");
}

#[tokio::test]
async fn structured_legacy_shape_is_accepted() {
    let (app, _server) = create_test_app().await;

    let response = app
        .oneshot(symptom_check(json!({
            "pain_level": 4,
            "bleeding": "severe",
            "swelling": "moderate",
            "fever": true
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["triage"]["score"], 51);
    assert_eq!(body["triage"]["red_flag"], true);
    assert_eq!(body["triage"]["tier"], "urgent");
}

#[tokio::test]
async fn anonymous_caller_gets_session_id() {
    let (app, _server) = create_test_app().await;

    let response = app
        .oneshot(symptom_check(json!({"symptoms": ["toothache"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let session_id = body["triage"]["session_id"].as_str().unwrap();
    assert!(Uuid::parse_str(session_id).is_ok());
}

#[tokio::test]
async fn returning_caller_keeps_their_session_id() {
    let (app, _server) = create_test_app().await;
    let session_id = Uuid::new_v4();

    let request = Request::builder()
        .method("POST")
        .uri(&format!("/symptom-check?session_id={}", session_id))
        .header("Content-Type", "application/json")
        .body(Body::from(json!({"symptoms": ["toothache"]}).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body["triage"]["session_id"].as_str().unwrap(),
        session_id.to_string()
    );
}

#[tokio::test]
async fn empty_symptom_list_is_rejected() {
    let (app, _server) = create_test_app().await;

    let response = app
        .oneshot(symptom_check(json!({"symptoms": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn result_is_returned_even_when_recording_fails() {
    // No store mock at all: the POST to the store 404s, the caller still
    // gets their assessment.
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_url(&mock_server.uri());
    let app = triage_routes(config.to_arc());

    let response = app
        .oneshot(symptom_check(json!({"symptoms": ["swollen jaw", "fever"]})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["triage"]["score"], 80);
    assert_eq!(body["triage"]["red_flag"], true);
}
