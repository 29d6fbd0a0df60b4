mod common;

use axum::http::StatusCode;
use chrono::Duration;
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn reserve_book_and_cancel() {
    let app = TestApp::new().await;
    let event_id = app.create_event(2, 5, 20.0).await;
    let seats = app.seat_ids(&event_id).await;
    assert_eq!(seats.len(), 10);
    let (a1, a2) = (seats[0].1.clone(), seats[1].1.clone());

    let (status, body) = app
        .post(
            &format!("/events/{}/seats/reserve", event_id),
            &app.alice.token,
            json!({ "selectedSeats": [a1, a2], "numberOfTickets": 2 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["totalPrice"], 40.0);
    assert_eq!(body["reservedSeats"].as_array().unwrap().len(), 2);

    // Someone else cannot take a held seat
    let (status, body) = app
        .post(
            &format!("/events/{}/seats/reserve", event_id),
            &app.bob.token,
            json!({ "selectedSeats": [a1], "numberOfTickets": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["unavailableSeats"][0]["reason"], "Already reserved");

    let (status, body) = app
        .post(
            &format!("/events/{}/book", event_id),
            &app.alice.token,
            json!({
                "numberOfTickets": 2,
                "paymentMethod": "credit_card",
                "selectedSeats": [{ "seatId": a1 }, { "seatId": a2 }]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["booking"]["totalAmount"], 40.0);
    assert_eq!(body["booking"]["status"], "pending");
    assert_eq!(body["event"]["availableSeats"], 8);

    let (_, map) = app.get(&format!("/events/{}/seats", event_id), None).await;
    assert_eq!(map["statistics"]["paid"], 2);
    assert_eq!(map["statistics"]["available"], 8);
    let first_row = map["seats"]["1"].as_array().unwrap();
    assert_eq!(first_row[0]["status"], "paid");
    assert!(first_row[0]["reservedBy"].is_null());

    let (_, event) = app.get(&format!("/events/{}", event_id), None).await;
    assert_eq!(event["event"]["currentBookings"], 2);

    let (status, body) = app
        .post(&format!("/events/{}/cancel-booking", event_id), &app.alice.token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["booking"]["status"], "cancelled");

    let (_, event) = app.get(&format!("/events/{}", event_id), None).await;
    assert_eq!(event["event"]["currentBookings"], 0);
    let (_, map) = app.get(&format!("/events/{}/seats", event_id), None).await;
    assert_eq!(map["statistics"]["paid"], 2);

    let (status, _) = app
        .post(
            &format!("/events/{}/book", event_id),
            &app.alice.token,
            json!({ "numberOfTickets": 1, "paymentMethod": "cash" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn expired_hold_cannot_be_booked() {
    let app = TestApp::new().await;
    let event_id = app.create_event(1, 4, 15.0).await;
    let seats = app.seat_ids(&event_id).await;

    let (status, _) = app
        .post(
            &format!("/events/{}/seats/reserve", event_id),
            &app.alice.token,
            json!({ "selectedSeats": [seats[0].1], "numberOfTickets": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(Duration::minutes(16));

    let (status, body) = app
        .post(
            &format!("/events/{}/book", event_id),
            &app.alice.token,
            json!({ "numberOfTickets": 1, "paymentMethod": "paypal", "selectedSeats": [seats[0].1] }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("expired"));

    // The elapsed hold is free for someone else
    let (status, _) = app
        .post(
            &format!("/events/{}/seats/reserve", event_id),
            &app.bob.token,
            json!({ "selectedSeats": [seats[0].1], "numberOfTickets": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn partial_reservation_holds_nothing() {
    let app = TestApp::new().await;
    let event_id = app.create_event(1, 3, 10.0).await;
    let seats = app.seat_ids(&event_id).await;

    app.post(
        &format!("/events/{}/seats/reserve", event_id),
        &app.bob.token,
        json!({ "selectedSeats": [seats[1].1], "numberOfTickets": 1 }),
    )
    .await;

    let (status, body) = app
        .post(
            &format!("/events/{}/seats/reserve", event_id),
            &app.alice.token,
            json!({ "selectedSeats": [seats[0].1, seats[1].1, seats[2].1], "numberOfTickets": 3 }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["unavailableSeats"].as_array().unwrap().len(), 1);

    let (_, map) = app.get(&format!("/events/{}/seats", event_id), None).await;
    assert_eq!(map["statistics"]["reserved"], 1);
    assert_eq!(map["statistics"]["available"], 2);
}

#[tokio::test]
async fn booking_validation_and_listings() {
    let app = TestApp::new().await;
    let event_id = app.create_event(1, 5, 12.0).await;

    let (status, body) = app
        .post(
            &format!("/events/{}/book", event_id),
            &app.alice.token,
            json!({ "numberOfTickets": 11, "paymentMethod": "cash" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "numberOfTickets");

    let (status, _) = app
        .post(
            &format!("/events/{}/book", event_id),
            &app.alice.token,
            json!({ "numberOfTickets": 2, "paymentMethod": "debit_card", "specialRequests": "Aisle please" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, mine) = app.get("/events/my-bookings", Some(&app.alice.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(mine["bookings"][0]["event"]["price"], 12.0);
    assert_eq!(mine["bookings"][0]["specialRequests"], "Aisle please");

    let (status, _) = app.get("/events/admin/all-bookings", Some(&app.alice.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, all) = app.get("/events/admin/all-bookings", Some(&app.admin.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all["bookings"].as_array().unwrap().len(), 1);

    let (status, per_event) = app
        .get(&format!("/events/admin/{}/bookings", event_id), Some(&app.admin.token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(per_event["bookings"][0]["numberOfTickets"], 2);
}

#[tokio::test]
async fn deleting_an_event_cancels_its_bookings() {
    let app = TestApp::new().await;
    let event_id = app.create_event(2, 2, 10.0).await;
    app.post(
        &format!("/events/{}/book", event_id),
        &app.alice.token,
        json!({ "numberOfTickets": 1, "paymentMethod": "cash" }),
    )
    .await;

    let (status, body) = app
        .request(
            axum::http::Method::DELETE,
            &format!("/events/{}", event_id),
            Some(&app.admin.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["cancelledBookings"], 1);
    assert_eq!(body["deletedSeats"], 4);

    let (status, _) = app.get(&format!("/events/{}", event_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, mine) = app.get("/events/my-bookings", Some(&app.alice.token)).await;
    assert_eq!(mine["bookings"][0]["status"], "cancelled");
    assert!(mine["bookings"][0]["event"].is_null());
}
