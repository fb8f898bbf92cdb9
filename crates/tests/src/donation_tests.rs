use crate::fixtures::seed::donation_body;
use crate::fixtures::test_app::TestApp;
use serde_json::{Value, json};

#[tokio::test]
async fn donor_creates_donation() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;

    let donation = app.create_donation(&donor, donation_body("Rice")).await;
    assert_eq!(donation["food_name"], "Rice");
    assert_eq!(donation["status"], "available");
    assert_eq!(donation["donor_id"], donor.id.as_str());
    assert_eq!(donation["donor_phone"], "9876543210");
    assert!(donation["claimed_by"].is_null());
}

#[tokio::test]
async fn ngo_cannot_create_donation() {
    let app = TestApp::spawn().await;
    let ngo = app.signup_ngo("ngo@test.com", "Helping Hands", None).await;

    let resp = app
        .auth_post("/api/donation", &ngo.access_token)
        .json(&donation_body("Rice"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn invalid_donation_is_rejected() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;

    let mut zero = donation_body("Rice");
    zero["quantity"] = json!(0);
    let mut backwards = donation_body("Rice");
    backwards["pickup_end"] = backwards["pickup_start"].clone();
    let mut bad_image = donation_body("Rice");
    bad_image["images"] = json!(["https://example.com/rice.png"]);

    for body in [zero, backwards, bad_image] {
        let resp = app
            .auth_post("/api/donation", &donor.access_token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422, "accepted {body}");
    }
}

#[tokio::test]
async fn browse_requires_a_session() {
    let app = TestApp::spawn().await;
    let resp = app.client.get(app.url("/api/donation")).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn browse_filters_by_search_category_and_allergens() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let ngo = app.signup_ngo("ngo@test.com", "Helping Hands", None).await;

    app.create_donation(&donor, donation_body("Veg Biryani")).await;

    let mut bread = donation_body("Bread Loaves");
    bread["category"] = json!("Bakery Items");
    bread["allergens"] = json!(["Gluten"]);
    app.create_donation(&donor, bread).await;

    let mut nuts = donation_body("Trail Mix");
    nuts["category"] = json!("Packaged Food");
    nuts["allergens"] = json!(["Nuts", "Dairy"]);
    app.create_donation(&donor, nuts).await;

    let names = |list: Vec<Value>| -> Vec<String> {
        list.iter()
            .map(|d| d["food_name"].as_str().unwrap().to_string())
            .collect()
    };

    let all: Vec<Value> = app
        .auth_get("/api/donation", &ngo.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let search: Vec<Value> = app
        .auth_get("/api/donation?search=biryani", &ngo.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(search), vec!["Veg Biryani"]);

    let bakery: Vec<Value> = app
        .auth_get("/api/donation?category=Bakery%20Items", &ngo.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(bakery), vec!["Bread Loaves"]);

    let safe: Vec<Value> = app
        .auth_get(
            "/api/donation?exclude_allergens=gluten,nuts&sort=highest_quantity",
            &ngo.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(names(safe), vec!["Veg Biryani"]);
}

#[tokio::test]
async fn browse_nearest_uses_viewer_location() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let ngo = app
        .signup_ngo("ngo@test.com", "Helping Hands", Some((12.9716, 77.5946)))
        .await;

    let mut far = donation_body("Far Meal");
    far["latitude"] = json!(13.0827);
    far["longitude"] = json!(80.2707);
    app.create_donation(&donor, far).await;

    let mut near = donation_body("Near Meal");
    near["latitude"] = json!(12.9750);
    near["longitude"] = json!(77.6000);
    app.create_donation(&donor, near).await;

    let list: Vec<Value> = app
        .auth_get("/api/donation?sort=nearest", &ngo.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["food_name"], "Near Meal");
    assert!(list[0]["distance_km"].as_f64().unwrap() < 1.0);
    assert!(list[0]["distance"].as_str().unwrap().ends_with(" m"));

    let within: Vec<Value> = app
        .auth_get("/api/donation?radius_km=10", &ngo.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(within.len(), 1);
    assert_eq!(within[0]["food_name"], "Near Meal");
}

#[tokio::test]
async fn mine_lists_only_own_donations() {
    let app = TestApp::spawn().await;
    let alice = app.signup_donor("alice@test.com").await;
    let bob = app.signup_donor("bob@test.com").await;

    app.create_donation(&alice, donation_body("Soup")).await;
    app.create_donation(&alice, donation_body("Bread")).await;
    app.create_donation(&bob, donation_body("Fruit")).await;

    let mine: Vec<Value> = app
        .auth_get("/api/donation/mine", &alice.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 2);
    assert!(mine.iter().all(|d| d["donor_id"] == alice.id.as_str()));
}

#[tokio::test]
async fn owner_updates_available_donation() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let other = app.signup_donor("other@test.com").await;
    let donation = app.create_donation(&donor, donation_body("Soup")).await;
    let id = donation["id"].as_str().unwrap();

    let resp = app
        .auth_put(&format!("/api/donation/{id}"), &donor.access_token)
        .json(&json!({ "quantity": 25, "description": "Tomato soup" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let updated: Value = resp.json().await.unwrap();
    assert_eq!(updated["quantity"], 25);
    assert_eq!(updated["description"], "Tomato soup");
    assert_eq!(updated["food_name"], "Soup");

    let resp = app
        .auth_put(&format!("/api/donation/{id}"), &other.access_token)
        .json(&json!({ "quantity": 1 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn edit_that_breaks_the_listing_is_rejected() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let donation = app.create_donation(&donor, donation_body("Soup")).await;
    let id = donation["id"].as_str().unwrap();

    let bodies = [
        json!({ "food_name": "" }),
        json!({ "unit": "  " }),
        json!({ "pickup_end": donation["pickup_start"] }),
        json!({ "expiry_time": "2000-01-01T00:00:00Z" }),
    ];
    for body in bodies {
        let resp = app
            .auth_put(&format!("/api/donation/{id}"), &donor.access_token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 422, "accepted {body}");
    }

    let resp = app
        .auth_get(&format!("/api/donation/{id}"), &donor.access_token)
        .send()
        .await
        .unwrap();
    let current: Value = resp.json().await.unwrap();
    assert_eq!(current["food_name"], "Soup");
    assert_eq!(current["unit"], "servings");
    assert_eq!(current["pickup_end"], donation["pickup_end"]);
}

#[tokio::test]
async fn owner_deletes_available_donation() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let donation = app.create_donation(&donor, donation_body("Soup")).await;
    let id = donation["id"].as_str().unwrap();

    let resp = app
        .auth_delete(&format!("/api/donation/{id}"), &donor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 204);

    let resp = app
        .auth_get(&format!("/api/donation/{id}"), &donor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn claimed_donation_cannot_be_edited_or_deleted() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;
    let ngo = app.signup_ngo("ngo@test.com", "Helping Hands", None).await;
    let donation = app.create_donation(&donor, donation_body("Soup")).await;
    let id = donation["id"].as_str().unwrap();

    let (status, _) = app.donation_action(&ngo, id, "claim").await;
    assert_eq!(status, 200);

    let resp = app
        .auth_put(&format!("/api/donation/{id}"), &donor.access_token)
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);

    let resp = app
        .auth_delete(&format!("/api/donation/{id}"), &donor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 422);
}

#[tokio::test]
async fn malformed_donation_id_is_bad_request() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;

    let resp = app
        .auth_get("/api/donation/not-an-id", &donor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn pickup_address_falls_back_to_coordinates() {
    let app = TestApp::spawn().await;
    let donor = app.signup_donor("donor@test.com").await;

    let resp = app
        .auth_get("/api/geocode/reverse?lat=12.5&lon=-3.25", &donor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["address"], "12.500000, -3.250000");
    assert_eq!(body["resolved"], false);

    let resp = app
        .auth_get("/api/geocode/reverse?lat=120&lon=0", &donor.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
