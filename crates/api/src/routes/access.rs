use axum::{Json, extract::Query};
use foodshare_services::access::{AccessDecision, check_access};
use serde::Deserialize;

use crate::extractors::auth::AuthUser;

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub path: String,
}

pub async fn check(auth: Option<AuthUser>, Query(query): Query<AccessQuery>) -> Json<AccessDecision> {
    Json(check_access(&query.path, auth.map(|a| a.role)))
}
