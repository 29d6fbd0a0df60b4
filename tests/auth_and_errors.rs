mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use common::{parse_body, TestApp};
use serde_json::{json, Value};
use tower::ServiceExt;

fn event_body(title: &str, price: f64) -> Value {
    json!({
        "title": title,
        "description": "x",
        "date": "2030-01-01T10:00:00Z",
        "location": "Hall",
        "capacity": 4,
        "price": price,
        "category": "concert",
        "bookingDeadline": "2029-12-31T10:00:00Z",
        "seatingLayout": { "rows": 2, "seatsPerRow": 2 }
    })
}

#[tokio::test]
async fn health_reports_memory_storage() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "memory");
}

#[tokio::test]
async fn protected_routes_need_a_valid_token() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/events/my-bookings", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access token is required");

    let (status, body) = app.get("/events/my-bookings", Some("not-a-token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or expired token");
}

#[tokio::test]
async fn access_token_header_is_accepted() {
    let app = TestApp::new().await;
    let request = Request::builder()
        .uri("/events/my-bookings")
        .header("accesstoken", app.alice.token.as_str())
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    assert!(body["bookings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn users_cannot_create_events() {
    let app = TestApp::new().await;
    let (status, _) = app
        .post("/events", &app.alice.token, event_body("Mine", 10.0))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn malformed_input_is_a_bad_request() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/events/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/events")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.admin.token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post("/events", &app.admin.token, event_body("", -1.0))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"price"));
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let app = TestApp::new().await;
    let missing = uuid::Uuid::new_v4();

    let (status, _) = app.get(&format!("/events/{}", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.get(&format!("/events/{}/seats", missing), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(&format!("/events/{}/cancel-booking", missing), &app.alice.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No booking found for this event");
}

#[tokio::test]
async fn browse_filters_through_the_query_string() {
    let app = TestApp::new().await;
    app.create_event(1, 2, 10.0).await;
    app.create_event(1, 2, 90.0).await;

    let (status, body) = app.get("/events?maxPrice=50&limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
    assert_eq!(body["pagination"]["totalEvents"], 1);
    assert_eq!(body["pagination"]["currentPage"], 1);

    let (_, body) = app.get("/events/browse?search=integration", None).await;
    assert_eq!(body["pagination"]["totalEvents"], 2);
}

#[tokio::test]
async fn notifications_follow_bookings() {
    let app = TestApp::new().await;
    let event_id = app.create_event(1, 2, 10.0).await;
    app.post(
        &format!("/events/{}/book", event_id),
        &app.alice.token,
        json!({ "numberOfTickets": 1, "paymentMethod": "cash" }),
    )
    .await;
    app.state.notifier.flush().await;

    let (status, body) = app.get("/notifications", Some(&app.alice.token)).await;
    assert_eq!(status, StatusCode::OK);
    let list = body["notifications"].as_array().unwrap();
    let confirmed = list
        .iter()
        .find(|n| n["type"] == "booking_confirmed")
        .expect("booking confirmation");
    assert!(list.iter().any(|n| n["type"] == "event_created"));

    let id = confirmed["id"].as_str().unwrap();
    let (status, _) = app
        .request(Method::PATCH, &format!("/notifications/{}/read", id), Some(&app.bob.token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .request(Method::PATCH, &format!("/notifications/{}/read", id), Some(&app.alice.token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["notification"]["isRead"], true);
}

#[tokio::test]
async fn analytics_is_admin_only() {
    let app = TestApp::new().await;
    let event_id = app.create_event(1, 4, 10.0).await;
    app.post(
        &format!("/events/{}/book", event_id),
        &app.alice.token,
        json!({ "numberOfTickets": 3, "paymentMethod": "cash" }),
    )
    .await;

    let (status, _) = app.get("/analytics/summary", Some(&app.alice.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/analytics/summary", Some(&app.admin.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bookings"]["ticketsSold"], 3);
    assert_eq!(body["totalRevenue"], 30.0);
    assert_eq!(body["tickets"]["records"], 0);
}
