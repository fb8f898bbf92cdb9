use crate::fixtures::seed::donation_body;
use crate::fixtures::test_app::TestApp;
use serde_json::Value;
use tokio_test::assert_ok;

async fn stats(app: &TestApp, query: &str) -> (u16, Value) {
    let resp = assert_ok!(
        app.client
            .get(app.url(&format!("/api/stats{query}")))
            .send()
            .await
    );
    let status = resp.status().as_u16();
    (status, assert_ok!(resp.json().await))
}

#[tokio::test]
async fn stats_are_public_and_count_the_platform() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let ngo = app.signup_ngo("ngo@test.com", "Kitchen", None).await;

    let done = app.create_donation(&donor, donation_body("Rice")).await;
    app.create_donation(&donor, donation_body("Bread")).await;
    let id = done["id"].as_str().unwrap();
    for action in ["claim", "collected", "delivered"] {
        let (status, _) = app.donation_action(&ngo, id, action).await;
        assert_eq!(status, 200);
    }

    let (status, body) = stats(&app, "").await;
    assert_eq!(status, 200);
    assert_eq!(body["total_donations"], 2);
    assert_eq!(body["active_donations"], 1);
    assert_eq!(body["completed_donations"], 1);
    assert_eq!(body["total_meals_served"], 10);
    assert_eq!(body["registered_users"], 2);
    assert_eq!(body["registered_ngos"], 1);
    assert_eq!(body["success_rate"], 50);
    assert_eq!(body["stale"], false);
}

#[tokio::test]
async fn cached_stats_skip_the_scan_until_a_write() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    app.create_donation(&donor, donation_body("Rice")).await;

    let (_, first) = stats(&app, "").await;
    assert_eq!(first["total_donations"], 1);
    let scans = app.memory().reads("donations");

    let (_, second) = stats(&app, "").await;
    assert_eq!(second["computed_at"], first["computed_at"]);
    assert_eq!(app.memory().reads("donations"), scans);

    // A new listing invalidates the cache.
    app.create_donation(&donor, donation_body("Bread")).await;
    let (_, third) = stats(&app, "").await;
    assert_eq!(third["total_donations"], 2);
    assert!(app.memory().reads("donations") > scans);
}

#[tokio::test]
async fn fresh_query_bypasses_the_cache() {
    let app = TestApp::spawn().await;
    stats(&app, "").await;
    let scans = app.memory().reads("donations");

    stats(&app, "?fresh=true").await;
    assert!(app.memory().reads("donations") > scans);
}

#[tokio::test]
async fn failed_recompute_serves_last_good_value_as_stale() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    app.create_donation(&donor, donation_body("Rice")).await;

    let (_, good) = stats(&app, "").await;
    assert_eq!(good["stale"], false);

    app.memory().fail_reads_from("donations", true);
    let (status, body) = stats(&app, "?fresh=true").await;
    assert_eq!(status, 200);
    assert_eq!(body["stale"], true);
    assert_eq!(body["total_donations"], 1);
}

#[tokio::test]
async fn failed_first_compute_is_an_error() {
    let app = TestApp::spawn().await;
    app.memory().fail_reads_from("donations", true);

    let (status, body) = stats(&app, "").await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "internal");
}

#[tokio::test]
async fn user_scan_failure_still_reports_donations() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    app.create_donation(&donor, donation_body("Rice")).await;
    app.settle().await;

    app.memory().fail_reads_from("users", true);
    let (status, body) = stats(&app, "?fresh=true").await;
    assert_eq!(status, 200);
    assert_eq!(body["total_donations"], 1);
    assert_eq!(body["registered_users"], 0);
}
