use std::time::Duration;

use actix_web::{App, test, web};
use serde_json::{Value, json};

use campus_auth::config::crypto::CryptoService;
use campus_auth::config::routes::routes;
use campus_auth::service::auth_service::{AuthService, UserStore};
use campus_auth::service::email_service::EmailService;
use campus_auth::service::otp_service::{OtpPolicy, OtpService};

fn dev_policy() -> OtpPolicy {
    OtpPolicy {
        ttl: Duration::from_secs(600),
        max_attempts: 5,
        resend_cooldown: Duration::ZERO,
        dev_mode: true,
    }
}

fn auth_service(policy: OtpPolicy) -> web::Data<AuthService> {
    let crypto = CryptoService::new();
    web::Data::new(AuthService::new(
        OtpService::new(policy, crypto.clone()),
        UserStore::new(),
        crypto,
        EmailService::disabled("Campus"),
    ))
}

macro_rules! app {
    ($policy:expr) => {
        test::init_service(
            App::new()
                .app_data(auth_service($policy))
                .configure(routes),
        )
        .await
    };
}

macro_rules! post {
    ($app:expr, $uri:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri($uri)
            .set_json($body)
            .to_request();
        let res = test::call_service($app, req).await;
        let status = res.status().as_u16();
        let body: Value = test::read_body_json(res).await;
        (status, body)
    }};
}

#[actix_web::test]
async fn request_then_verify_round_trip() {
    let app = app!(dev_policy());

    let (status, body) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "user@example.com"})
    );
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["expiresIn"], 600);
    assert_eq!(body["emailSent"], false);
    let code = body["devCode"].as_str().unwrap().to_string();

    let (status, body) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "user@example.com", "otp": code})
    );
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    // Single use: the same code is gone now.
    let (status, body) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "user@example.com", "otp": code})
    );
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn malformed_email_is_a_bad_request() {
    let app = app!(dev_policy());

    let (status, body) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "not-an-email"})
    );
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn malformed_code_is_a_bad_request() {
    let app = app!(dev_policy());

    let (status, _) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "user@example.com"})
    );
    assert_eq!(status, 200);

    let (status, body) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "user@example.com", "otp": "12a456"})
    );
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn wrong_code_is_unauthorized_until_lockout() {
    let app = app!(dev_policy());

    let (_, body) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "user@example.com"})
    );
    let code = body["devCode"].as_str().unwrap().to_string();
    let wrong = if code == "000000" { "000001" } else { "000000" };

    for _ in 0..4 {
        let (status, body) = post!(
            &app,
            "/api/auth/otp/verify",
            json!({"email": "user@example.com", "otp": wrong})
        );
        assert_eq!(status, 401);
        assert_eq!(body["success"], false);
    }

    // Fifth wrong attempt trips the lockout; even the right code fails now.
    let (status, _) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "user@example.com", "otp": wrong})
    );
    assert_eq!(status, 401);

    let (status, body) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "user@example.com", "otp": code})
    );
    assert_eq!(status, 401);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn resend_cooldown_returns_too_many_requests() {
    let policy = OtpPolicy {
        resend_cooldown: Duration::from_secs(60),
        ..dev_policy()
    };
    let app = app!(policy);

    let (status, _) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "user@example.com"})
    );
    assert_eq!(status, 200);

    let (status, body) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "user@example.com"})
    );
    assert_eq!(status, 429);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn registration_flow_creates_a_verified_account() {
    let app = app!(dev_policy());

    let (status, body) = post!(
        &app,
        "/api/auth/register",
        json!({
            "name": "Dana Walker",
            "email": "dana@example.com",
            "password": "correct-horse-battery",
        })
    );
    assert_eq!(status, 200);
    let code = body["devCode"].as_str().unwrap().to_string();

    let (status, body) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "dana@example.com", "otp": code})
    );
    assert_eq!(status, 200);
    assert_eq!(body["user"]["email"], "dana@example.com");
    assert_eq!(body["user"]["email_verified"], true);
    assert!(body["user"].get("password_hash").is_none());

    // The address is taken now.
    let (status, _) = post!(
        &app,
        "/api/auth/register",
        json!({
            "name": "Dana Walker",
            "email": "dana@example.com",
            "password": "correct-horse-battery",
        })
    );
    assert_eq!(status, 409);
}

#[actix_web::test]
async fn short_password_fails_validation() {
    let app = app!(dev_policy());

    let (status, body) = post!(
        &app,
        "/api/auth/register",
        json!({
            "name": "Dana Walker",
            "email": "dana@example.com",
            "password": "short",
        })
    );
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}

#[actix_web::test]
async fn login_purpose_requires_an_account() {
    let app = app!(dev_policy());

    let (status, _) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "ghost@example.com", "purpose": "login"})
    );
    assert_eq!(status, 404);

    // Register and activate, then the login code round-trips.
    let (_, body) = post!(
        &app,
        "/api/auth/register",
        json!({
            "name": "Dana Walker",
            "email": "dana@example.com",
            "password": "correct-horse-battery",
        })
    );
    let code = body["devCode"].as_str().unwrap().to_string();
    let (status, _) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "dana@example.com", "otp": code})
    );
    assert_eq!(status, 200);

    let (status, body) = post!(
        &app,
        "/api/auth/otp/request",
        json!({"email": "dana@example.com", "purpose": "login"})
    );
    assert_eq!(status, 200);
    let code = body["devCode"].as_str().unwrap().to_string();

    let (status, body) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "dana@example.com", "otp": code, "purpose": "login"})
    );
    assert_eq!(status, 200);
    assert_eq!(body["user"]["email"], "dana@example.com");
}

#[actix_web::test]
async fn verify_without_request_is_not_found() {
    let app = app!(dev_policy());

    let (status, body) = post!(
        &app,
        "/api/auth/otp/verify",
        json!({"email": "user@example.com", "otp": "123456"})
    );
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
}
