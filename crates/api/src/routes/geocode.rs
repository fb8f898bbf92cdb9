use axum::{
    Json,
    extract::{Query, State},
};
use foodshare_services::geocoding::ResolvedAddress;
use serde::Deserialize;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lon: f64,
}

pub async fn reverse(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ReverseQuery>,
) -> Result<Json<ResolvedAddress>, ApiError> {
    if !(-90.0..=90.0).contains(&query.lat) || !(-180.0..=180.0).contains(&query.lon) {
        return Err(ApiError::BadRequest("Coordinates out of range".to_string()));
    }
    Ok(Json(state.geocoding.reverse(query.lat, query.lon).await))
}
