use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::{build_service, intake, now, read_json_body, rep};
use crate::leads::router::lead_router;
use crate::leads::service::RuleDraft;

fn json_request(method: &str, uri: &str, payload: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request builds")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

fn intake_payload() -> Value {
    json!({
        "first_name": "Jordan",
        "last_name": "Avery",
        "email": "jordan.avery@example.com",
        "source": "referral",
        "location": "Des Moines",
        "metadata": {
            "budget_min": 20000,
            "budget_max": 30000,
            "product_interest": "crossover"
        }
    })
}

fn round_robin_payload(name: &str, reps: &[&str]) -> Value {
    json!({
        "name": name,
        "priority": 5,
        "logic": {
            "type": "round_robin",
            "reps": reps
        }
    })
}

#[tokio::test]
async fn intake_returns_accepted_with_scored_view() {
    let (service, _repository, _notifier) = build_service();
    let router = lead_router(service);

    let response = router
        .oneshot(json_request("POST", "/api/v1/leads", &intake_payload()))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = read_json_body(response).await;
    assert_eq!(body["scored"], json!(true));
    assert_eq!(body["lead"]["score"], json!(26));
    assert_eq!(body["lead"]["classification"], json!("cold"));
}

#[tokio::test]
async fn missing_lead_view_is_not_found() {
    let (service, _repository, _notifier) = build_service();
    let router = lead_router(service);

    let response = router
        .oneshot(empty_request("GET", "/api/v1/leads/lead-missing"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn activity_route_updates_the_view() {
    let (service, _repository, _notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.0.clone();
    let router = lead_router(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/leads/{lead_id}/activities"),
            &json!({ "activity_type": "email_open" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let response = router
        .oneshot(empty_request("GET", &format!("/api/v1/leads/{lead_id}")))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["score"], json!(37));
}

#[tokio::test]
async fn rescore_route_returns_ok() {
    let (service, _repository, _notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.0.clone();
    let router = lead_router(service);

    let response = router
        .oneshot(empty_request(
            "POST",
            &format!("/api/v1/leads/{lead_id}/rescore"),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["lead"]["score"], json!(26));
}

#[tokio::test]
async fn history_route_lists_transitions() {
    let (service, _repository, _notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.0.clone();
    let router = lead_router(service);

    let response = router
        .oneshot(empty_request(
            "GET",
            &format!("/api/v1/leads/{lead_id}/history"),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    let rows = body.as_array().expect("history array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["new_score"], json!(26));
}

#[tokio::test]
async fn rule_creation_validates_the_directory() {
    let (service, repository, _notifier) = build_service();
    repository.add_representative(rep("rep-a"));
    let router = lead_router(service);

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/assignment-rules",
            &round_robin_payload("inbound rotation", &["rep-a"]),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/assignment-rules",
            &round_robin_payload("ghost rotation", &["rep-ghost"]),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn apply_route_conflicts_on_second_assignment() {
    let (service, repository, _notifier) = build_service();
    repository.add_representative(rep("rep-a"));
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.0.clone();
    let rule = service
        .create_rule(
            serde_json::from_value::<RuleDraft>(round_robin_payload("manual push", &["rep-a"]))
                .expect("draft parses"),
            now(),
        )
        .expect("rule created");
    let router = lead_router(service);
    let uri = format!("/api/v1/assignment-rules/{}/apply", rule.id.0);
    let payload = json!({ "lead_id": lead_id });

    let response = router
        .clone()
        .oneshot(json_request("POST", &uri, &payload))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(json_request("POST", &uri, &payload))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn probe_route_reports_the_candidate() {
    let (service, repository, _notifier) = build_service();
    repository.add_representative(rep("rep-a"));
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.0.clone();
    let rule = service
        .create_rule(
            serde_json::from_value::<RuleDraft>(round_robin_payload("dry run", &["rep-a"]))
                .expect("draft parses"),
            now(),
        )
        .expect("rule created");
    let router = lead_router(service);

    let response = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/assignment-rules/{}/test", rule.id.0),
            &json!({ "lead_id": lead_id }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_json_body(response).await;
    assert_eq!(body["matched"], json!(true));
    assert_eq!(body["candidate"], json!("rep-a"));
}
