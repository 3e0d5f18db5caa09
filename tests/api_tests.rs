use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use voxgate::config::Config;
use wiremock::matchers::{header as header_eq, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";
const VOICE_ID: &str = "voice123";

struct TestApp {
    router: Router,
    _dir: TempDir,
}

async fn spawn_app(provider_url: Option<&str>) -> TestApp {
    let dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.credentials.path = Some(dir.path().join("users.json").display().to_string());
    config.security.argon2_memory_cost_kib = 1024;
    config.security.argon2_time_cost = 1;
    config.server.secure_cookies = false;
    if let Some(url) = provider_url {
        config.provider.base_url = url.to_string();
        config.provider.api_key = Some(API_KEY.to_string());
    }

    let state = voxgate::api::create_app_state_from_config(config, None)
        .await
        .expect("Failed to create app state");

    TestApp {
        router: voxgate::api::router(state),
        _dir: dir,
    }
}

async fn mock_provider() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/voices"))
        .and(header_eq("xi-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "voices": [
                { "voice_id": VOICE_ID, "name": "Rachel", "category": "premade" },
                { "voice_id": "voice456", "name": "Adam" }
            ]
        })))
        .mount(&server)
        .await;

    server
}

async fn mock_speech(server: &MockServer, audio: &[u8]) {
    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{VOICE_ID}")))
        .and(header_eq("xi-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(audio.to_vec()))
        .mount(server)
        .await;
}

async fn send(
    app: &TestApp,
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Logs in and returns the session cookie.
async fn login(app: &TestApp, username: &str, password: &str) -> String {
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "username": username, "password": password }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK, "login as {username}");

    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .expect("login should set a session cookie")
        .to_string()
}

async fn create_user(app: &TestApp, admin_cookie: &str, username: &str, password: &str) {
    let (status, _) = send(
        app,
        "POST",
        "/api/admin/users",
        Some(admin_cookie),
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_login() {
    let app = spawn_app(None).await;

    for uri in ["/api/voices", "/api/history", "/api/admin/users", "/api/metrics"] {
        let (status, body) = send(&app, "GET", uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["success"], false);
    }

    let (status, body) = send(&app, "GET", "/api/auth/session", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["logged_in"], false);
    assert!(body["data"]["username"].is_null());
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = spawn_app(None).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "admin", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "nobody", "password": "admin" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let cookie = login(&app, "admin", "admin").await;

    let (status, body) = send(&app, "GET", "/api/auth/session", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["logged_in"], true);
    assert_eq!(body["data"]["username"], "admin");
    assert_eq!(body["data"]["is_admin"], true);
    assert_eq!(body["data"]["view_mode"], "normal");

    let (status, _) = send(&app, "GET", "/api/models", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/api/auth/logout", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/models", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = send(&app, "GET", "/api/auth/session", Some(&cookie), None).await;
    assert_eq!(body["data"]["logged_in"], false);
}

#[tokio::test]
async fn test_admin_creates_user_who_can_log_in() {
    let app = spawn_app(None).await;
    let admin = login(&app, "admin", "admin").await;

    // Directory operations need the admin view.
    let (status, _) = send(&app, "GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, "POST", "/api/admin/open", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["view_mode"], "admin");

    create_user(&app, &admin, "bob", "pw123").await;

    let (status, _) = send(
        &app,
        "POST",
        "/api/admin/users",
        Some(&admin),
        Some(json!({ "username": "bob", "password": "other" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["data"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0]["username"], "admin");
    assert_eq!(users[0]["role"], "admin");
    assert_eq!(users[1]["username"], "bob");
    assert_eq!(users[1]["role"], "user");

    let bob = login(&app, "bob", "pw123").await;
    let (_, body) = send(&app, "GET", "/api/auth/session", Some(&bob), None).await;
    assert_eq!(body["data"]["username"], "bob");
    assert_eq!(body["data"]["is_admin"], false);

    // A normal user cannot reach the directory and their view is unchanged.
    let (status, _) = send(&app, "POST", "/api/admin/open", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, "GET", "/api/admin/users", Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, body) = send(&app, "GET", "/api/auth/session", Some(&bob), None).await;
    assert_eq!(body["data"]["view_mode"], "normal");

    let (status, body) = send(&app, "POST", "/api/admin/close", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["view_mode"], "normal");
}

#[tokio::test]
async fn test_admin_cannot_delete_self() {
    let app = spawn_app(None).await;
    let admin = login(&app, "admin", "admin").await;
    send(&app, "POST", "/api/admin/open", Some(&admin), None).await;

    let (status, _) = send(&app, "DELETE", "/api/admin/users/admin", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "DELETE", "/api/admin/users/ghost", Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, "GET", "/api/admin/users", Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_deleting_user_purges_history_and_ends_session() {
    let server = mock_provider().await;
    mock_speech(&server, b"ID3-carol").await;
    let app = spawn_app(Some(&server.uri())).await;

    let admin = login(&app, "admin", "admin").await;
    send(&app, "POST", "/api/admin/open", Some(&admin), None).await;
    create_user(&app, &admin, "carol", "secret").await;

    let carol = login(&app, "carol", "secret").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/generate/speech",
        Some(&carol),
        Some(json!({ "text": "Hello from Carol", "voice_id": VOICE_ID })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "DELETE", "/api/admin/users/carol", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "carol");
    assert_eq!(body["data"]["purged_generations"], 1);
    assert_eq!(body["data"]["persisted"], true);

    let (status, _) = send(&app, "GET", "/api/history", Some(&carol), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "carol", "password": "secret" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_old_session_does_not_carry_over_to_recreated_user() {
    let server = mock_provider().await;
    mock_speech(&server, b"ID3-carol").await;
    let app = spawn_app(Some(&server.uri())).await;

    let admin = login(&app, "admin", "admin").await;
    send(&app, "POST", "/api/admin/open", Some(&admin), None).await;
    create_user(&app, &admin, "carol", "old-pw").await;
    let old_carol = login(&app, "carol", "old-pw").await;

    let (status, _) = send(&app, "DELETE", "/api/admin/users/carol", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    create_user(&app, &admin, "carol", "new-pw").await;

    let new_carol = login(&app, "carol", "new-pw").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/generate/speech",
        Some(&new_carol),
        Some(json!({ "text": "Only mine", "voice_id": VOICE_ID })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/api/history", Some(&old_carol), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = send(&app, "GET", "/api/auth/session", Some(&old_carol), None).await;
    assert_eq!(body["data"]["logged_in"], false);
    assert!(body["data"]["username"].is_null());

    let (_, body) = send(&app, "GET", "/api/history", Some(&new_carol), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_generation_finishing_after_delete_is_discarded() {
    let server = mock_provider().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{VOICE_ID}")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"ID3-slow".to_vec())
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;
    let app = spawn_app(Some(&server.uri())).await;

    let admin = login(&app, "admin", "admin").await;
    send(&app, "POST", "/api/admin/open", Some(&admin), None).await;
    create_user(&app, &admin, "carol", "old-pw").await;
    let old_carol = login(&app, "carol", "old-pw").await;

    let request = Request::builder()
        .method("POST")
        .uri("/api/generate/speech")
        .header(header::COOKIE, &old_carol)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "text": "Still running", "voice_id": VOICE_ID }).to_string(),
        ))
        .unwrap();
    let in_flight = tokio::spawn(app.router.clone().oneshot(request));

    tokio::time::sleep(Duration::from_millis(200)).await;
    let (status, body) = send(&app, "DELETE", "/api/admin/users/carol", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["purged_generations"], 0);
    create_user(&app, &admin, "carol", "new-pw").await;

    let response = in_flight.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let new_carol = login(&app, "carol", "new-pw").await;
    let (status, body) = send(&app, "GET", "/api/history", Some(&new_carol), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_speech_generation_and_download() {
    let server = mock_provider().await;
    mock_speech(&server, b"ID3-audio-bytes").await;
    let app = spawn_app(Some(&server.uri())).await;
    let cookie = login(&app, "admin", "admin").await;

    let (status, body) = send(&app, "GET", "/api/voices", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["voice_id"], VOICE_ID);
    assert_eq!(body["data"][0]["name"], "Rachel");

    let text = "This sentence is deliberately longer than fifty characters in total.";
    let (status, body) = send(
        &app,
        "POST",
        "/api/generate/speech",
        Some(&cookie),
        Some(json!({
            "text": text,
            "voice_id": VOICE_ID,
            "voice_settings": { "stability": 0.3, "speed": 5.0 }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let generated = &body["data"];
    assert_eq!(generated["kind"], "text_to_speech");
    assert_eq!(generated["voice_name"], "Rachel");
    assert_eq!(generated["model_name"], "Multilingual v2 (Enhanced)");
    assert_eq!(generated["size_bytes"], 15);
    let label = generated["label"].as_str().unwrap();
    assert!(label.ends_with("..."));
    assert_eq!(label.chars().count(), 53);

    let (status, body) = send(&app, "GET", "/api/history", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::OK);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["id"], generated["id"]);

    let (_, body) = send(
        &app,
        "GET",
        "/api/history?kind=voice_conversion",
        Some(&cookie),
        None,
    )
    .await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let audio_url = generated["audio_url"].as_str().unwrap();
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(audio_url)
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert!(
        response.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment;")
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"ID3-audio-bytes");
}

#[tokio::test]
async fn test_history_is_private_and_windowed() {
    let server = mock_provider().await;
    mock_speech(&server, b"ID3").await;
    let app = spawn_app(Some(&server.uri())).await;

    let admin = login(&app, "admin", "admin").await;
    send(&app, "POST", "/api/admin/open", Some(&admin), None).await;
    create_user(&app, &admin, "dave", "pw").await;
    let dave = login(&app, "dave", "pw").await;

    let mut last_url = String::new();
    for i in 0..7 {
        let (status, body) = send(
            &app,
            "POST",
            "/api/generate/speech",
            Some(&admin),
            Some(json!({ "text": format!("clip {i}"), "voice_id": VOICE_ID })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        last_url = body["data"]["audio_url"].as_str().unwrap().to_string();
    }

    let (_, body) = send(&app, "GET", "/api/history", Some(&admin), None).await;
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 5);
    assert_eq!(records[0]["label"], "clip 6");
    assert_eq!(records[4]["label"], "clip 2");

    let (_, body) = send(&app, "GET", "/api/history?limit=10", Some(&admin), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 7);

    let (status, _) = send(&app, "GET", "/api/history?limit=0", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = send(&app, "GET", "/api/history", Some(&dave), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, _) = send(&app, "GET", &last_url, Some(&dave), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_provider_failure_surfaces_message_without_history() {
    let server = mock_provider().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/text-to-speech/{VOICE_ID}")))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": { "message": "Invalid API key" } })),
        )
        .mount(&server)
        .await;
    let app = spawn_app(Some(&server.uri())).await;
    let cookie = login(&app, "admin", "admin").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/generate/speech",
        Some(&cookie),
        Some(json!({ "text": "Hello", "voice_id": VOICE_ID })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("401"), "{error}");
    assert!(error.contains("Invalid API key"), "{error}");

    let (_, body) = send(&app, "GET", "/api/history", Some(&cookie), None).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_generation_input_validation() {
    let server = mock_provider().await;
    let app = spawn_app(Some(&server.uri())).await;
    let cookie = login(&app, "admin", "admin").await;

    for payload in [
        json!({ "text": "   ", "voice_id": VOICE_ID }),
        json!({ "text": "Hello", "voice_id": "../v1/voices" }),
        json!({ "text": "Hello", "voice_id": VOICE_ID, "model_id": "no_such_model" }),
    ] {
        let (status, _) = send(
            &app,
            "POST",
            "/api/generate/speech",
            Some(&cookie),
            Some(payload),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_voice_conversion_upload() {
    let server = mock_provider().await;
    Mock::given(method("POST"))
        .and(path(format!("/v1/speech-to-speech/{VOICE_ID}")))
        .and(header_eq("xi-api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3-converted".to_vec()))
        .mount(&server)
        .await;
    let app = spawn_app(Some(&server.uri())).await;
    let cookie = login(&app, "admin", "admin").await;

    let boundary = "voxgate-test-boundary";
    let body = format!(
        "--{b}\r\nContent-Disposition: form-data; name=\"voice_id\"\r\n\r\n{VOICE_ID}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"voice_settings\"\r\n\r\n{{\"stability\":0.4}}\r\n\
         --{b}\r\nContent-Disposition: form-data; name=\"audio\"; filename=\"sample.wav\"\r\n\
         Content-Type: audio/wav\r\n\r\nRIFF-sample\r\n--{b}--\r\n",
        b = boundary
    );

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/generate/conversion")
                .header(header::COOKIE, &cookie)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, body) = send(
        &app,
        "GET",
        "/api/history?kind=voice_conversion",
        Some(&cookie),
        None,
    )
    .await;
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["label"], "Conversion to Rachel");
    assert_eq!(records[0]["kind"], "voice_conversion");
    assert_eq!(records[0]["size_bytes"], 13);
}

#[tokio::test]
async fn test_unconfigured_provider_is_unavailable() {
    let app = spawn_app(None).await;
    let cookie = login(&app, "admin", "admin").await;

    let (status, body) = send(&app, "GET", "/api/voices", Some(&cookie), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].as_str().unwrap().contains("ELEVENLABS_API_KEY"));

    let (status, _) = send(
        &app,
        "POST",
        "/api/generate/speech",
        Some(&cookie),
        Some(json!({ "text": "Hello", "voice_id": VOICE_ID })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_accounts_survive_restart() {
    let dir = TempDir::new().unwrap();
    let credentials_path = dir.path().join("users.json").display().to_string();

    let build = |path: String| async move {
        let mut config = Config::default();
        config.credentials.path = Some(path);
        config.security.argon2_memory_cost_kib = 1024;
        config.security.argon2_time_cost = 1;
        let state = voxgate::api::create_app_state_from_config(config, None)
            .await
            .unwrap();
        voxgate::api::router(state)
    };

    let first = TestApp {
        router: build(credentials_path.clone()).await,
        _dir: TempDir::new().unwrap(),
    };
    let admin = login(&first, "admin", "admin").await;
    send(&first, "POST", "/api/admin/open", Some(&admin), None).await;
    create_user(&first, &admin, "erin", "pw").await;

    let second = TestApp {
        router: build(credentials_path).await,
        _dir: TempDir::new().unwrap(),
    };
    login(&second, "erin", "pw").await;
}
