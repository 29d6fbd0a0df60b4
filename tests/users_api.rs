mod common;

use axum::http::{Method, StatusCode};
use common::{parse_body, TestApp, PASSWORD};
use serde_json::{json, Value};

fn sign_up_body(email: &str) -> Value {
    json!({
        "firstName": "Maya",
        "lastName": "Lin",
        "email": email,
        "password": "Str0ng!pass",
        "gender": "female",
        "age": 29,
        "role": "admin"
    })
}

async fn log_in(app: &TestApp, email: &str, password: &str) -> (StatusCode, Value) {
    app.request(
        Method::POST,
        "/users/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

#[tokio::test]
async fn sign_up_then_log_in_and_read_profile() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::POST, "/users/signup", None, Some(sign_up_body("maya@example.com")))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["role"], "user");
    assert!(body["user"].get("passwordHash").is_none());

    let (status, body) = log_in(&app, "maya@example.com", "Str0ng!pass").await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["message"], "User signed in successfully");
    assert!(body["user"]["lastLogin"].is_string());
    let token = body["accesstoken"].as_str().unwrap().to_string();

    let (status, body) = app.get("/users/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "maya@example.com");
    assert_eq!(body["user"]["age"], 29);
}

#[tokio::test]
async fn duplicate_email_and_bad_credentials_are_rejected() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(Method::POST, "/users/signup", None, Some(sign_up_body("alice@example.com")))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let mut weak = sign_up_body("weak@example.com");
    weak["password"] = json!("short");
    let (status, body) = app.request(Method::POST, "/users/signup", None, Some(weak)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "password");

    let (status, body) = log_in(&app, "alice@example.com", "Wrong!pass1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    let (status, _) = log_in(&app, "alice@example.com", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn logout_revokes_the_access_token() {
    let app = TestApp::new().await;
    let (_, body) = log_in(&app, "bob@example.com", PASSWORD).await;
    let token = body["accesstoken"].as_str().unwrap().to_string();

    let (status, body) = app.request(Method::POST, "/users/logout", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = app.get("/users/profile", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Token has been revoked");

    let (status, _) = app.get("/users/profile", Some(&app.bob.token)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_token_mints_a_new_access_token() {
    let app = TestApp::new().await;
    let (_, body) = log_in(&app, "alice@example.com", PASSWORD).await;
    let refresh = body["refreshtoken"].as_str().unwrap().to_string();

    let response = app
        .send(Method::POST, "/users/refresh-token", &[("refreshtoken", &refresh)])
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = parse_body(response).await;
    let access = body["accesstoken"].as_str().unwrap().to_string();
    let (status, _) = app.get("/users/profile", Some(&access)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/users/profile", Some(&refresh)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let response = app.send(Method::POST, "/users/refresh-token", &[]).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admins_add_and_list_users() {
    let app = TestApp::new().await;

    let (status, _) = app.get("/users", Some(&app.alice.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post("/users/add", &app.alice.token, sign_up_body("staff@example.com"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post("/users/add", &app.admin.token, sign_up_body("staff@example.com"))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["user"]["role"], "admin");

    let (status, body) = app.get("/users", Some(&app.admin.token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn profile_update_guards_role_changes() {
    let app = TestApp::new().await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/users/update",
            Some(&app.alice.token),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .request(
            Method::PUT,
            "/users/update",
            Some(&app.alice.token),
            Some(json!({ "lastName": "Walker", "age": 40 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["lastName"], "Walker");
    assert_eq!(body["user"]["role"], "user");
}
