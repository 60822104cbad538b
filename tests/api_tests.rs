mod common;

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use common::{pipeline, router, RecordingFeedback, PROFILE_ID};

fn app() -> (Router, Arc<RecordingFeedback>) {
    let feedback = Arc::new(RecordingFeedback::default());
    (router(pipeline(), Arc::clone(&feedback)), feedback)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

fn generate_body() -> Value {
    json!({
        "profile_ref": PROFILE_ID,
        "occasion_type": "minor_occasion"
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let (app, _) = app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "client-abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "client-abc-123");
}

#[tokio::test]
async fn test_generate_returns_triple() {
    let (app, _) = app();
    let (status, body) = post(&app, "/api/v1/recommendations/generate", generate_body()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["partial"], false);
    assert!(body["generation_id"].is_string());

    let candidates = body["candidates"].as_array().unwrap();
    assert_eq!(candidates.len(), 3);
    for candidate in candidates {
        assert!(candidate["id"].is_string());
        assert!(candidate["external_url"].is_string());
        assert!(candidate["final_score"].as_f64().unwrap() > 0.0);
        assert!(candidate["interest_score"].is_number());
    }
}

#[tokio::test]
async fn test_generate_unknown_profile_is_not_found() {
    let (app, _) = app();
    let (status, body) = post(
        &app,
        "/api/v1/recommendations/generate",
        json!({
            "profile_ref": "00000000-0000-0000-0000-000000000000",
            "occasion_type": "just_because"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_generate_rejects_malformed_body() {
    let (app, _) = app();
    let (status, _) = post(
        &app,
        "/api/v1/recommendations/generate",
        json!({ "profile_ref": PROFILE_ID, "occasion_type": "birthday" }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_refresh_round_trip() {
    let (app, _) = app();
    let (_, generated) = post(&app, "/api/v1/recommendations/generate", generate_body()).await;
    let first_id = generated["candidates"][0]["id"].clone();

    let (status, body) = post(
        &app,
        "/api/v1/recommendations/refresh",
        json!({
            "profile_ref": PROFILE_ID,
            "occasion_type": "minor_occasion",
            "generation_id": generated["generation_id"],
            "rejected_ids": [first_id],
            "reason": "show_different"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reason"], "show_different");
    assert_eq!(body["round"], 1);
    assert_eq!(body["generation_id"], generated["generation_id"]);
    assert!(body["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .all(|c| c["id"] != first_id));
}

#[tokio::test]
async fn test_refresh_unknown_generation_is_not_found() {
    let (app, _) = app();
    let (status, body) = post(
        &app,
        "/api/v1/recommendations/refresh",
        json!({
            "profile_ref": PROFILE_ID,
            "occasion_type": "minor_occasion",
            "generation_id": "00000000-0000-0000-0000-00000000abcd",
            "rejected_ids": ["decanter"],
            "reason": "too_cheap"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");
}

#[tokio::test]
async fn test_refresh_rejects_oversized_vibe_override() {
    let (app, _) = app();
    let (_, generated) = post(&app, "/api/v1/recommendations/generate", generate_body()).await;

    let (status, body) = post(
        &app,
        "/api/v1/recommendations/refresh",
        json!({
            "profile_ref": PROFILE_ID,
            "occasion_type": "minor_occasion",
            "generation_id": generated["generation_id"],
            "rejected_ids": [generated["candidates"][0]["id"]],
            "reason": "not_their_style",
            "vibe_override": ["vintage", "bohemian", "romantic", "minimalist", "outdoorsy"]
        }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_feedback_is_accepted_and_recorded() {
    let (app, feedback) = app();
    let (status, _) = post(
        &app,
        "/api/v1/recommendations/feedback",
        json!({
            "recommendation_id": "decanter",
            "action": "rated",
            "rating": 5,
            "feedback_text": "They loved it"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    let records = feedback.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].rating, Some(5));
}

#[tokio::test]
async fn test_feedback_with_invalid_rating_is_rejected() {
    let (app, feedback) = app();
    let (status, body) = post(
        &app,
        "/api/v1/recommendations/feedback",
        json!({
            "recommendation_id": "decanter",
            "action": "rated",
            "rating": 9
        }),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation_error");
    assert!(feedback.records.lock().unwrap().is_empty());
}
