//! End-to-end flows against a real PostgreSQL. Set `TEST_DATABASE_URL` to run.

mod common;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use common::{body_json, database_pool, post_json};
use punch_tracker::config::AppConfig;
use punch_tracker::services::CacheService;
use punch_tracker::{create_routes, AppState};

struct Client {
    app: Router,
    token: String,
    csrf: String,
}

impl Client {
    fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::COOKIE, format!("csrf_token={}", self.csrf))
            .header("x-csrf-token", self.csrf.as_str())
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap()
    }

    async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(self.request(method, uri, body)).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }
}

async fn signed_in(app: Router, role: &str) -> (Client, String) {
    let suffix = Uuid::new_v4().simple().to_string();
    let email = format!("{}@example.com", &suffix[..12]);

    let response = app
        .clone()
        .oneshot(post_json(
            "/auth/signup",
            &json!({
                "username": format!("user_{}", &suffix[..12]),
                "email": email,
                "password": "password123",
                "role": role,
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json("/auth/login", &json!({"email": email, "password": "password123"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let client = Client {
        app,
        token: body["access_token"].as_str().unwrap().to_string(),
        csrf: body["csrf_token"].as_str().unwrap().to_string(),
    };
    (client, email)
}

#[tokio::test]
async fn test_workout_lifecycle() {
    let Some(pool) = database_pool().await else {
        return;
    };
    let state = AppState::new(AppConfig::default(), pool, CacheService::disabled());
    let metrics = state.metrics.clone();
    let (client, _) = signed_in(create_routes(state), "athlete").await;

    let (status, started) = client
        .send(Method::POST, "/api/workouts/start", Some(json!({"template_name": "sparring"})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(started["template"]["rounds"], 6);

    // Starting again returns the running workout
    let (_, again) = client.send(Method::POST, "/api/workouts/start", None).await;
    assert_eq!(again["id"], started["id"]);

    let (_, active) = client.send(Method::GET, "/api/workouts/active", None).await;
    assert_eq!(active["id"], started["id"]);

    let (status, punch) = client
        .send(Method::POST, "/api/punches", Some(json!({"punch_type": "jab", "speed": 20.0, "count": 3})))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(punch["workout_id"], started["id"]);
    assert!(punch["segment_id"].is_i64());
    // One stored row, regardless of its count
    assert_eq!(metrics.counter_value("punches_logged_total", &[("punch_type", "jab")]), 1);

    let (status, _) = client.send(Method::POST, "/api/workouts/stop", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, active) = client.send(Method::GET, "/api/workouts/active", None).await;
    assert!(active.is_null());

    let summary_uri = format!("/api/workouts/{}/summary", started["id"]);
    let (status, summary) = client.send(Method::GET, &summary_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["total_punches"], 3);
    assert_eq!(summary["average_speed"], 20.0);
    assert_eq!(summary["rounds"], 6);
    assert_eq!(summary["rests"], 5);

    let (_, weekly) = client.send(Method::GET, "/api/analytics/weekly", None).await;
    assert_eq!(weekly["this_week"]["total_punches"], 3);
    assert_eq!(weekly["sparkline_data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_sessions_are_scoped_to_owner() {
    let Some(pool) = database_pool().await else {
        return;
    };
    let app = create_routes(AppState::new(AppConfig::default(), pool, CacheService::disabled()));
    let (owner, _) = signed_in(app.clone(), "athlete").await;
    let (other, _) = signed_in(app, "athlete").await;

    let (status, session) = owner
        .send(Method::POST, "/api/sessions", Some(json!({"name": "Bag work"})))
        .await;
    assert_eq!(status, StatusCode::OK);

    let uri = format!("/api/sessions/{}", session["id"]);
    let (status, body) = other.send(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Session not found");

    let (status, _) = other
        .send(
            Method::POST,
            "/api/punches",
            Some(json!({"session_id": session["id"], "punch_type": "hook", "speed": 25.0})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, analytics) = owner
        .send(Method::GET, &format!("/api/analytics/{}", session["id"]), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(analytics["total_punches"], 0);
    assert_eq!(analytics["ml_classification"], "Beginner");
}

#[tokio::test]
async fn test_coach_invite_and_leaderboard() {
    let Some(pool) = database_pool().await else {
        return;
    };
    let app = create_routes(AppState::new(AppConfig::default(), pool, CacheService::disabled()));
    let (coach, _) = signed_in(app.clone(), "coach").await;
    let (athlete, athlete_email) = signed_in(app, "athlete").await;

    let (status, _) = athlete.send(Method::GET, "/api/coach/leaderboard", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let invite = json!({"athlete_email": athlete_email});
    let (status, body) = coach.send(Method::POST, "/api/coach/invite", Some(invite.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["invite_code"].as_str().unwrap().len(), 8);

    let (status, body) = coach.send(Method::POST, "/api/coach/invite", Some(invite)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Athlete is already linked to you");

    for (caller, code) in [(&athlete, "short"), (&coach, "AB12CD34")] {
        let (status, body) = caller
            .send(Method::POST, "/api/coach/accept", Some(json!({"invite_code": code})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Invite accepted successfully");
    }

    let (status, board) = coach.send(Method::GET, "/api/coach/leaderboard?range=week", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = board["entries"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[0]["daily_punches"].as_array().unwrap().len(), 7);

    let (status, _) = coach.send(Method::GET, "/api/coach/leaderboard?range=month", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
