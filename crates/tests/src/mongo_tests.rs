//! Runs against a real MongoDB when `FOODSHARE__DATABASE__URL` is set and
//! passes trivially otherwise.

use crate::fixtures::seed::{donation_body, signup_body};
use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn unique_email_index_rejects_duplicate_signup() {
    let Some(app) = TestApp::spawn_mongo().await else {
        return;
    };
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
async fn donation_lifecycle_round_trips_through_mongo() {
    let Some(app) = TestApp::spawn_mongo().await else {
        return;
    };
    let donor = app.signup_donor("donor@test.com").await;
    let ngo = app.signup_ngo("ngo@test.com", "Helping Hands", None).await;

    app.create_donation(&donor, donation_body("Old Soup")).await;
    let donation = app.create_donation(&donor, donation_body("Rice")).await;
    let id = donation["id"].as_str().unwrap();

    let browse: Vec<Value> = app
        .auth_get("/api/donation", &ngo.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let mut names: Vec<&str> = browse.iter().map(|d| d["food_name"].as_str().unwrap()).collect();
    names.sort();
    assert_eq!(names, ["Old Soup", "Rice"]);

    let (status, claimed) = app.donation_action(&ngo, id, "claim").await;
    assert_eq!(status, 200);
    assert_eq!(claimed["status"], "claimed");
    let (status, _) = app.donation_action(&ngo, id, "claim").await;
    assert_eq!(status, 409);

    for action in ["en-route", "collected", "delivered"] {
        let (status, _) = app.donation_action(&ngo, id, action).await;
        assert_eq!(status, 200, "{action} failed");
    }
    app.settle().await;

    let history: Vec<Value> = app
        .auth_get(&format!("/api/donation/{id}/history"), &donor.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let mut statuses: Vec<&str> = history.iter().map(|h| h["status"].as_str().unwrap()).collect();
    statuses.sort();
    assert_eq!(statuses, ["claimed", "completed", "on_the_way", "picked_up"]);

    let notifications: Vec<Value> = app
        .auth_get("/api/notification", &donor.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notifications.len(), 4);
    assert!(notifications.iter().all(|n| n["related_donation_id"] == id));

    let stats: Value = app
        .client
        .get(app.url("/api/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["total_donations"], 2);
    assert_eq!(stats["completed_donations"], 1);
}
