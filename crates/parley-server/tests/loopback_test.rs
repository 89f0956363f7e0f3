//! End-to-end flow over a real loopback listener: the client session layer
//! drives the full signup → verify → signin → encrypted message round trip
//! against the assembled router.

use std::sync::Arc;
use std::time::Duration;

use parley_api::auth::AppStateInner;
use parley_api::routes;
use parley_client::Session;
use parley_db::Database;
use parley_mail::{Mailer, RecordingMailer};

async fn spawn_server() -> (String, RecordingMailer) {
    let recorder = RecordingMailer::new();
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        mailer: Mailer::Recording(recorder.clone()),
        jwt_secret: "loopback-secret".into(),
        otp_ttl: Duration::from_secs(300),
    });

    let app = routes::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), recorder)
}

/// Signup, verify with the mailed code, and sign in.
async fn onboard(
    base_url: &str,
    recorder: &RecordingMailer,
    username: &str,
    email: &str,
    password: &str,
) -> Session {
    let mut session = Session::new(base_url);
    session.signup(username, email, password).await.unwrap();
    let otp = recorder.last_otp().unwrap();
    session.verify_otp(email, &otp).await.unwrap();
    session.signin(email, password).await.unwrap();
    session
}

#[tokio::test]
async fn encrypted_message_round_trip() {
    let (base_url, recorder) = spawn_server().await;

    let alice = onboard(&base_url, &recorder, "alice", "a@x.com", "pw1").await;
    let bob = onboard(&base_url, &recorder, "bob", "b@x.com", "pw2").await;

    let alice_id = alice.identity().unwrap().user_id;
    let bob_id = bob.identity().unwrap().user_id;

    alice.send_message(bob_id, "hello bob").await.unwrap();
    bob.send_message(alice_id, "hi alice").await.unwrap();

    let seen_by_alice = alice.conversation(bob_id, None, None).await.unwrap();
    let seen_by_bob = bob.conversation(alice_id, None, None).await.unwrap();

    let bodies: Vec<&str> = seen_by_alice.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["hello bob", "hi alice"]);

    // Both participants observe the identical ordered sequence.
    let ids = |msgs: &[parley_types::models::ChatMessage]| {
        msgs.iter().map(|m| m.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&seen_by_alice), ids(&seen_by_bob));

    // The wire carried ciphertext, not the plaintext bodies.
    let raw: Vec<parley_types::api::MessageResponse> = reqwest::Client::new()
        .get(format!("{}/messages/{}", base_url, bob_id))
        .bearer_auth(&alice.identity().unwrap().token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!raw[0].ciphertext.contains("hello"));
}

#[tokio::test]
async fn profile_and_user_listing() {
    let (base_url, recorder) = spawn_server().await;

    let alice = onboard(&base_url, &recorder, "alice", "a@x.com", "pw1").await;
    let _bob = onboard(&base_url, &recorder, "bob", "b@x.com", "pw2").await;

    let profile = alice.profile().await.unwrap();
    assert_eq!(profile.username, "alice");
    assert_eq!(profile.email, "a@x.com");

    let others = alice.users().await.unwrap();
    assert_eq!(others.len(), 1);
    assert_eq!(others[0].username, "bob");
}

#[tokio::test]
async fn signin_rejected_until_verified() {
    let (base_url, _recorder) = spawn_server().await;

    let mut session = Session::new(&base_url);
    session.signup("carol", "c@x.com", "pw3").await.unwrap();

    let err = session.signin("c@x.com", "pw3").await.unwrap_err();
    assert!(err.to_string().contains("UNVERIFIED_ACCOUNT"), "{err}");
}

#[tokio::test]
async fn verified_email_cannot_sign_up_again() {
    let (base_url, recorder) = spawn_server().await;

    let _alice = onboard(&base_url, &recorder, "alice", "a@x.com", "pw1").await;
    let mails_before = recorder.sent_count();

    let session = Session::new(&base_url);
    let err = session.signup("imposter", "a@x.com", "pw9").await.unwrap_err();
    assert!(err.to_string().contains("DUPLICATE_EMAIL"), "{err}");
    assert_eq!(recorder.sent_count(), mails_before);
}

#[tokio::test]
async fn resent_otp_supersedes_the_first() {
    let (base_url, recorder) = spawn_server().await;

    let session = Session::new(&base_url);
    session.signup("dave", "d@x.com", "pw4").await.unwrap();

    let message = session.signup("dave", "d@x.com", "pw4").await.unwrap();
    assert_eq!(message, "OTP resent to email");
    assert_eq!(recorder.sent_count(), 2);

    // Verification succeeds with the latest mailed code.
    let latest_otp = recorder.last_otp().unwrap();
    session.verify_otp("d@x.com", &latest_otp).await.unwrap();
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let (base_url, _recorder) = spawn_server().await;

    let response = reqwest::Client::new()
        .get(format!("{}/profile", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "UNAUTHORIZED");
}

#[tokio::test]
async fn liveness_and_root_endpoints() {
    let (base_url, _recorder) = spawn_server().await;
    let client = reqwest::Client::new();

    let health: serde_json::Value = client
        .get(format!("{}/health", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    let root: serde_json::Value = client
        .get(format!("{}/", base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["version"], env!("CARGO_PKG_VERSION"));

    let missing = client
        .get(format!("{}/nope", base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
}
