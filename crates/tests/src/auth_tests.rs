use crate::fixtures::seed::{PASSWORD, signup_body};
use crate::fixtures::test_app::TestApp;
use serde_json::Value;

fn link_token(body: &str) -> String {
    body.rsplit("token=").next().unwrap_or_default().trim().to_string()
}

#[tokio::test]
async fn signup_creates_user_and_returns_tokens() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/signup"))
        .json(&signup_body("Alice@Test.com", "donor", None, None))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 201);
    assert!(resp.headers().get("set-cookie").is_some());

    let json: Value = resp.json().await.unwrap();
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());
    assert_eq!(json["user"]["email"], "alice@test.com");
    assert_eq!(json["user"]["role"], "donor");
    assert_eq!(json["user"]["dashboard"], "/donor/dashboard");
    assert_eq!(json["user"]["email_verified"], false);
}

#[tokio::test]
async fn ngo_signup_keeps_organization() {
    let app = TestApp::spawn().await;
    let ngo = app.signup_ngo("ngo@test.com", "City Food Bank", None).await;

    let resp = app.auth_get("/api/auth/me", &ngo.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["role"], "ngo");
    assert_eq!(me["organization_name"], "City Food Bank");
    assert_eq!(me["dashboard"], "/ngo/dashboard");
}

#[tokio::test]
async fn ngo_signup_without_organization_fails() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/signup"))
        .json(&signup_body("ngo@test.com", "ngo", None, None))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn signup_duplicate_email_fails() {
    let app = TestApp::spawn().await;
    app.signup_donor("dup@test.com").await;

    let resp = app
        .client
        .post(app.url("/api/auth/signup"))
        .json(&signup_body("DUP@test.com", "donor", None, None))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn signup_rejects_invalid_input() {
    let app = TestApp::spawn().await;

    let mut bad_phone = signup_body("phone@test.com", "donor", None, None);
    bad_phone["phone"] = serde_json::json!("12345");
    let mut mismatch = signup_body("mismatch@test.com", "donor", None, None);
    mismatch["confirm_password"] = serde_json::json!("Different1");
    let mut bad_email = signup_body("x@test.com", "donor", None, None);
    bad_email["email"] = serde_json::json!("not-an-email");

    for body in [bad_phone, mismatch, bad_email] {
        let resp = app
            .client
            .post(app.url("/api/auth/signup"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422, "accepted {body}");
    }
}

#[tokio::test]
async fn login_with_valid_credentials() {
    let app = TestApp::spawn().await;
    app.signup_donor("login@test.com").await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({
            "email": "LOGIN@test.com",
            "password": PASSWORD,
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert!(json["access_token"].is_string());
    assert_eq!(json["user"]["email"], "login@test.com");
}

#[tokio::test]
async fn login_distinguishes_unknown_email_from_wrong_password() {
    let app = TestApp::spawn().await;
    app.signup_donor("known@test.com").await;

    let wrong = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({ "email": "known@test.com", "password": "Nope12345" }))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status().as_u16(), 401);
    let body: Value = wrong.json().await.unwrap();
    assert_eq!(body["message"], "Incorrect email or password.");

    let unknown = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({ "email": "ghost@test.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(unknown.status().as_u16(), 404);
}

#[tokio::test]
async fn me_requires_a_session() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/api/auth/me")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app.auth_get("/api/auth/me", "garbage").send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn me_accepts_the_session_cookie() {
    let app = TestApp::spawn().await;
    let user = app.signup_donor("cookie@test.com").await;

    let resp = app
        .client
        .get(app.url("/api/auth/me"))
        .header("Cookie", format!("access_token={}", user.access_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["id"], user.id.as_str());
}

#[tokio::test]
async fn refresh_issues_new_tokens() {
    let app = TestApp::spawn().await;
    let user = app.signup_donor("refresh@test.com").await;

    let resp = app
        .client
        .post(app.url("/api/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": user.refresh_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert!(json["access_token"].is_string());

    // An access token is not accepted as a refresh token.
    let resp = app
        .client
        .post(app.url("/api/auth/refresh"))
        .json(&serde_json::json!({ "refresh_token": user.access_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn update_profile_changes_fields() {
    let app = TestApp::spawn().await;
    let user = app.signup_donor("profile@test.com").await;

    let resp = app
        .auth_put("/api/auth/me", &user.access_token)
        .json(&serde_json::json!({
            "display_name": "Renamed",
            "latitude": 12.97,
            "longitude": 77.59,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["display_name"], "Renamed");
    assert_eq!(me["latitude"], 12.97);

    let resp = app
        .auth_put("/api/auth/me", &user.access_token)
        .json(&serde_json::json!({ "phone": "12" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn verification_link_marks_email_verified() {
    let app = TestApp::spawn().await;
    let user = app.signup_donor("verify@test.com").await;

    let mail = app.mailer.last_to("verify@test.com").expect("no verification mail");
    assert!(mail.body.contains("/verify-email?token="));

    let resp = app
        .client
        .post(app.url("/api/auth/verify-email"))
        .json(&serde_json::json!({ "token": link_token(&mail.body) }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["email_verified"], true);

    let resp = app.auth_get("/api/auth/me", &user.access_token).send().await.unwrap();
    let me: Value = resp.json().await.unwrap();
    assert_eq!(me["email_verified"], true);
}

#[tokio::test]
async fn unknown_verification_token_is_rejected() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/verify-email"))
        .json(&serde_json::json!({ "token": "not-a-real-token" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn resend_verification_respects_cooldown() {
    let app = TestApp::spawn().await;
    let user = app.signup_donor("cooldown@test.com").await;

    // The signup mail already started the window.
    let resp = app
        .auth_post("/api/auth/resend-verification", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 429);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "too_many_requests");
    assert_eq!(app.mailer.sent().len(), 1);
}

#[tokio::test]
async fn resend_verification_without_cooldown_sends_again() {
    let app = TestApp::spawn_with_settings(|s| s.auth.email_cooldown_secs = 0).await;
    let user = app.signup_donor("again@test.com").await;

    let resp = app
        .auth_post("/api/auth/resend-verification", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);
    assert_eq!(app.mailer.sent().len(), 2);
}

#[tokio::test]
async fn password_reset_round_trip() {
    let app = TestApp::spawn().await;
    app.signup_donor("reset@test.com").await;

    let resp = app
        .client
        .post(app.url("/api/auth/password-reset"))
        .json(&serde_json::json!({ "email": "reset@test.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 202);

    let mail = app.mailer.last_to("reset@test.com").expect("no reset mail");
    assert!(mail.body.contains("/reset-password?token="));

    let resp = app
        .client
        .post(app.url("/api/auth/password-reset/confirm"))
        .json(&serde_json::json!({
            "token": link_token(&mail.body),
            "password": "BrandNew99",
            "confirm_password": "BrandNew99",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let old = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({ "email": "reset@test.com", "password": PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(old.status().as_u16(), 401);

    let new = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&serde_json::json!({ "email": "reset@test.com", "password": "BrandNew99" }))
        .send()
        .await
        .unwrap();
    assert_eq!(new.status().as_u16(), 200);
}

#[tokio::test]
async fn password_reset_for_unknown_email_is_not_found() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/password-reset"))
        .json(&serde_json::json!({ "email": "nobody@test.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let app = TestApp::spawn().await;

    let resp = app.client.post(app.url("/api/auth/logout")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let cookie = resp.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(cookie.starts_with("access_token=;"));
    assert!(cookie.contains("Max-Age=0"));
}
