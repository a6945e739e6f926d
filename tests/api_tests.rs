// tests/api_tests.rs

use std::sync::Arc;

use lms_backend::config::Config;
use lms_backend::engine::memory::{
    MemoryAssessmentStore, MemoryAttemptLedger, MemorySessionStore,
};
use lms_backend::events::LogEventSink;
use lms_backend::routes;
use lms_backend::state::AppState;
use lms_backend::utils::jwt::sign_jwt;

const JWT_SECRET: &str = "test_secret_for_integration_tests";

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
///
/// The app runs against the in-memory stores, so no database is needed.
async fn spawn_app() -> String {
    let config = Config {
        database_url: String::new(),
        jwt_secret: JWT_SECRET.to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
    };

    let state = AppState::new(
        Arc::new(MemoryAssessmentStore::new()),
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemoryAttemptLedger::new()),
        Arc::new(LogEventSink),
        config,
    );

    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn admin_token() -> String {
    sign_jwt(1, "admin", JWT_SECRET, 600).expect("Failed to sign admin token")
}

fn learner_token(user_id: i64) -> String {
    sign_jwt(user_id, "user", JWT_SECRET, 600).expect("Failed to sign learner token")
}

#[tokio::test]
async fn attempt_routes_require_a_token() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/assessments/1/eligibility", address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn admin_routes_reject_learners() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/admin/assessments", address))
        .header("Authorization", format!("Bearer {}", learner_token(7)))
        .json(&serde_json::json!({ "title": "Sneaky" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 403);
}

#[tokio::test]
async fn create_assessment_fails_validation() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Empty title and a zero-minute duration are both rejected.
    let response = client
        .post(format!("{}/api/admin/assessments", address))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&serde_json::json!({ "title": "", "duration_minutes": 0 }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn eligibility_for_unknown_assessment_is_404_with_a_verdict_body() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/assessments/999/eligibility", address))
        .header("Authorization", format!("Bearer {}", learner_token(7)))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["eligible"], false);
    assert_eq!(body["reasons"], serde_json::json!(["not_found"]));
}

#[tokio::test]
async fn full_attempt_flow() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let learner = learner_token(7);

    // 1. Admin creates a timed assessment with two attempts and one resume.
    let created: serde_json::Value = client
        .post(format!("{}/api/admin/assessments", address))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&serde_json::json!({
            "title": "Rust fundamentals",
            "duration_minutes": 60,
            "allowed_attempts": 2,
            "resume_limit": 1,
            "allowed_languages": ["rust"]
        }))
        .send()
        .await
        .expect("Create failed")
        .json()
        .await
        .expect("Failed to parse create json");
    let aid = created["id"].as_i64().expect("Assessment id missing");

    // 2. The learner is eligible to start.
    let verdict: serde_json::Value = client
        .get(format!("{}/api/assessments/{}/eligibility", address, aid))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .expect("Eligibility failed")
        .json()
        .await
        .unwrap();
    assert_eq!(verdict["eligible"], true);
    assert_eq!(verdict["can_start"], true);
    assert_eq!(verdict["attempts"]["allowed"], 2);

    // 3. Start an attempt; the countdown is seeded from the server.
    let start_resp = client
        .post(format!("{}/api/assessments/{}/attempts", address, aid))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .expect("Start failed");
    assert_eq!(start_resp.status().as_u16(), 201);
    let session: serde_json::Value = start_resp.json().await.unwrap();
    let session_id = session["id"].as_str().expect("Session id missing").to_string();
    assert_eq!(session["status"], "active");
    assert_eq!(session["remaining_seconds"], 3600);

    // 4. A double-click start conflicts and names the existing session.
    let dup_resp = client
        .post(format!("{}/api/assessments/{}/attempts", address, aid))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .expect("Duplicate start failed");
    assert_eq!(dup_resp.status().as_u16(), 409);
    let dup: serde_json::Value = dup_resp.json().await.unwrap();
    assert_eq!(dup["code"], "active_session_exists");
    assert_eq!(dup["session_id"], session_id.as_str());

    // 5. First resume succeeds; the second exceeds the limit and cancels.
    let resume_resp = client
        .post(format!(
            "{}/api/assessments/{}/attempts/{}/resume",
            address, aid, session_id
        ))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .expect("Resume failed");
    assert_eq!(resume_resp.status().as_u16(), 200);
    let resumed: serde_json::Value = resume_resp.json().await.unwrap();
    assert_eq!(resumed["resume_count"], 1);

    let over_resp = client
        .post(format!(
            "{}/api/assessments/{}/attempts/{}/resume",
            address, aid, session_id
        ))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .expect("Second resume failed");
    assert_eq!(over_resp.status().as_u16(), 403);
    let over: serde_json::Value = over_resp.json().await.unwrap();
    assert_eq!(over["code"], "resume_count_exceeded");

    // 6. The cancelled session no longer blocks; a fresh attempt starts.
    let verdict: serde_json::Value = client
        .get(format!("{}/api/assessments/{}/eligibility", address, aid))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(verdict["can_start"], true);

    let session: serde_json::Value = client
        .post(format!("{}/api/assessments/{}/attempts", address, aid))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .expect("Restart failed")
        .json()
        .await
        .unwrap();
    let session_id = session["id"].as_str().unwrap().to_string();

    // 7. Finish is idempotent: the retry observes the same terminal state.
    let finish_resp = client
        .post(format!(
            "{}/api/assessments/{}/attempts/{}/finish",
            address, aid, session_id
        ))
        .header("Authorization", format!("Bearer {}", learner))
        .json(&serde_json::json!({ "score": 88 }))
        .send()
        .await
        .expect("Finish failed");
    assert_eq!(finish_resp.status().as_u16(), 200);
    let finished: serde_json::Value = finish_resp.json().await.unwrap();
    assert_eq!(finished["status"], "completed");
    let ended_at = finished["ended_at"].clone();

    let retry: serde_json::Value = client
        .post(format!(
            "{}/api/assessments/{}/attempts/{}/finish",
            address, aid, session_id
        ))
        .header("Authorization", format!("Bearer {}", learner))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("Finish retry failed")
        .json()
        .await
        .unwrap();
    assert_eq!(retry["status"], "completed");
    assert_eq!(retry["ended_at"], ended_at);

    // 8. One of two attempts is now spent.
    let verdict: serde_json::Value = client
        .get(format!("{}/api/assessments/{}/eligibility", address, aid))
        .header("Authorization", format!("Bearer {}", learner))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(verdict["attempts"]["used"], 1);
    assert_eq!(verdict["can_start"], true);
}

#[tokio::test]
async fn finishing_someone_elses_session_is_404() {
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    let created: serde_json::Value = client
        .post(format!("{}/api/admin/assessments", address))
        .header("Authorization", format!("Bearer {}", admin_token()))
        .json(&serde_json::json!({ "title": "Ownership check", "duration_minutes": 30 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let aid = created["id"].as_i64().unwrap();

    let session: serde_json::Value = client
        .post(format!("{}/api/assessments/{}/attempts", address, aid))
        .header("Authorization", format!("Bearer {}", learner_token(7)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let session_id = session["id"].as_str().unwrap();

    // A different learner probing the id cannot tell it exists.
    let response = client
        .post(format!(
            "{}/api/assessments/{}/attempts/{}/finish",
            address, aid, session_id
        ))
        .header("Authorization", format!("Bearer {}", learner_token(8)))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
}
