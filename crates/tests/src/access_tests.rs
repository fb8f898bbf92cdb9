use crate::fixtures::test_app::TestApp;
use serde_json::Value;

async fn check(app: &TestApp, path: &str, token: Option<&str>) -> Value {
    let url = format!("/api/access?path={path}");
    let req = match token {
        Some(token) => app.auth_get(&url, token),
        None => app.client.get(app.url(&url)),
    };
    let resp = req.send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn anonymous_visitors_see_public_pages_only() {
    let app = TestApp::spawn().await;

    let landing = check(&app, "/", None).await;
    assert_eq!(landing["allowed"], true);

    let dashboard = check(&app, "/donor/dashboard", None).await;
    assert_eq!(dashboard["allowed"], false);
    assert_eq!(dashboard["redirect"], "/login");
}

#[tokio::test]
async fn wrong_role_is_sent_to_own_dashboard() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let ngo = app.signup_ngo("ngo@test.com", "Kitchen", None).await;

    let own = check(&app, "/donor/create", Some(&donor.access_token)).await;
    assert_eq!(own["allowed"], true);

    let other = check(&app, "/ngo/browse", Some(&donor.access_token)).await;
    assert_eq!(other["allowed"], false);
    assert_eq!(other["redirect"], "/donor/dashboard");

    let ngo_side = check(&app, "/donor/dashboard", Some(&ngo.access_token)).await;
    assert_eq!(ngo_side["redirect"], "/ngo/dashboard");
}

#[tokio::test]
async fn invalid_token_counts_as_anonymous() {
    let app = TestApp::spawn().await;

    let decision = check(&app, "/ngo/dashboard", Some("not-a-token")).await;
    assert_eq!(decision["allowed"], false);
    assert_eq!(decision["redirect"], "/login");
}

#[tokio::test]
async fn health_check_reports_ok() {
    let app = TestApp::spawn().await;
    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}
