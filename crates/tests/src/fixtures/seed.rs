use chrono::{Duration, Utc};
use serde_json::{Value, json};

use super::test_app::TestApp;

pub const PASSWORD: &str = "Secret123";

pub struct SeededUser {
    pub id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    /// Sign up a user and return their auth info.
    pub async fn signup(&self, body: Value) -> SeededUser {
        let email = body["email"].as_str().unwrap_or_default().to_string();
        let resp = self
            .client
            .post(self.url("/api/auth/signup"))
            .json(&body)
            .send()
            .await
            .expect("Signup request failed");

        assert_eq!(
            resp.status().as_u16(),
            201,
            "Signup failed: {}",
            resp.text().await.unwrap_or_default()
        );

        let json: Value = resp.json().await.expect("Failed to parse signup response");
        SeededUser {
            id: json["user"]["id"].as_str().unwrap().to_string(),
            email,
            access_token: json["access_token"].as_str().unwrap().to_string(),
            refresh_token: json["refresh_token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn signup_donor(&self, email: &str) -> SeededUser {
        self.signup(signup_body(email, "donor", None, None)).await
    }

    pub async fn signup_ngo(&self, email: &str, org: &str, at: Option<(f64, f64)>) -> SeededUser {
        self.signup(signup_body(email, "ngo", Some(org), at)).await
    }

    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    /// List a donation as `donor` and return the created record.
    pub async fn create_donation(&self, donor: &SeededUser, body: Value) -> Value {
        let resp = self
            .auth_post("/api/donation", &donor.access_token)
            .json(&body)
            .send()
            .await
            .expect("Create donation failed");
        assert_eq!(
            resp.status().as_u16(),
            201,
            "Create donation failed: {}",
            resp.text().await.unwrap_or_default()
        );
        resp.json().await.unwrap()
    }

    /// POST a workflow action and return the response status and body.
    pub async fn donation_action(&self, user: &SeededUser, id: &str, action: &str) -> (u16, Value) {
        let resp = self
            .auth_post(&format!("/api/donation/{id}/{action}"), &user.access_token)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}

pub fn signup_body(email: &str, role: &str, org: Option<&str>, at: Option<(f64, f64)>) -> Value {
    let mut body = json!({
        "email": email,
        "password": PASSWORD,
        "confirm_password": PASSWORD,
        "display_name": email.split('@').next().unwrap_or("user"),
        "phone": "9876543210",
        "role": role,
    });
    if let Some(org) = org {
        body["organization_name"] = json!(org);
    }
    if let Some((lat, lon)) = at {
        body["latitude"] = json!(lat);
        body["longitude"] = json!(lon);
    }
    body
}

/// A valid listing: pickup over the next three hours, expiring in six.
pub fn donation_body(food_name: &str) -> Value {
    let now = Utc::now();
    json!({
        "food_name": food_name,
        "description": format!("Fresh {food_name}"),
        "quantity": 10,
        "unit": "servings",
        "category": "Cooked Food",
        "allergens": ["None"],
        "expiry_time": (now + Duration::hours(6)).to_rfc3339(),
        "pickup_start": now.to_rfc3339(),
        "pickup_end": (now + Duration::hours(3)).to_rfc3339(),
        "address": "12 Market Road",
    })
}
