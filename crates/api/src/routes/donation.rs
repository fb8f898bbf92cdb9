use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use bson::oid::ObjectId;
use chrono::{DateTime, Utc};
use foodshare_db::models::{Donation, DonationStatus, Role, StatusHistory};
use foodshare_services::{
    browse::{BrowseFilter, BrowseItem, SortOrder},
    dao::donation::{DonationPatch, NewDonation},
    geo::format_distance,
    workflow::DonationAction,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateDonationRequest {
    pub food_name: String,
    #[serde(default)]
    pub description: String,
    pub quantity: u32,
    pub unit: String,
    pub category: String,
    #[serde(default)]
    pub allergens: Vec<String>,
    pub expiry_time: DateTime<Utc>,
    pub pickup_start: DateTime<Utc>,
    pub pickup_end: DateTime<Utc>,
    #[serde(default)]
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub images: Vec<String>,
    pub special_instructions: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateDonationRequest {
    pub food_name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<u32>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub allergens: Option<Vec<String>>,
    pub expiry_time: Option<DateTime<Utc>>,
    pub pickup_start: Option<DateTime<Utc>>,
    pub pickup_end: Option<DateTime<Utc>>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Option<Vec<String>>,
    pub special_instructions: Option<String>,
}

/// Browse query string. `exclude_allergens` is comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct BrowseQuery {
    pub search: Option<String>,
    pub category: Option<String>,
    pub exclude_allergens: Option<String>,
    pub radius_km: Option<f64>,
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Deserialize)]
pub struct ActionQuery {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DonationResponse {
    pub id: String,
    pub donor_id: String,
    pub donor_name: String,
    pub donor_phone: String,
    pub food_name: String,
    pub description: String,
    pub quantity: u32,
    pub unit: String,
    pub category: String,
    pub allergens: Vec<String>,
    pub expiry_time: String,
    pub pickup_start: String,
    pub pickup_end: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub images: Vec<String>,
    pub special_instructions: Option<String>,
    pub status: DonationStatus,
    pub claimed_by: Option<String>,
    pub claimed_by_name: Option<String>,
    pub claimed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusHistoryResponse {
    pub id: String,
    pub donation_id: String,
    pub status: DonationStatus,
    pub changed_by: String,
    pub changed_by_name: String,
    pub notes: String,
    pub created_at: String,
}

pub async fn browse(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<Vec<DonationResponse>>, ApiError> {
    let viewer = auth.profile(&state).await?;
    let filter = BrowseFilter {
        search: query.search,
        category: query.category,
        exclude_allergens: query
            .exclude_allergens
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|a| !a.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
        radius_km: query.radius_km,
        sort: query.sort.unwrap_or_default(),
    };

    let items = state.donations.browse(&viewer, &filter).await?;
    Ok(Json(items.into_iter().map(browse_response).collect()))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateDonationRequest>,
) -> Result<(StatusCode, Json<DonationResponse>), ApiError> {
    auth.require_role(Role::Donor)?;
    let donor = auth.profile(&state).await?;

    let input = NewDonation {
        food_name: body.food_name,
        description: body.description,
        quantity: body.quantity,
        unit: body.unit,
        category: body.category,
        allergens: body.allergens,
        expiry_time: bson::DateTime::from_chrono(body.expiry_time),
        pickup_start: bson::DateTime::from_chrono(body.pickup_start),
        pickup_end: bson::DateTime::from_chrono(body.pickup_end),
        address: body.address,
        latitude: body.latitude,
        longitude: body.longitude,
        images: body.images,
        special_instructions: body.special_instructions,
    };
    let donation = state.donations.create_donation(&donor, input).await?;
    Ok((StatusCode::CREATED, Json(to_response(donation))))
}

pub async fn mine(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<DonationResponse>>, ApiError> {
    auth.require_role(Role::Donor)?;
    let list = state.donations.get_donations_by_donor(auth.user_id).await?;
    Ok(Json(list.into_iter().map(to_response).collect()))
}

pub async fn claimed(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<DonationResponse>>, ApiError> {
    auth.require_role(Role::Ngo)?;
    let list = state.donations.get_donations_by_claimer(auth.user_id).await?;
    Ok(Json(list.into_iter().map(to_response).collect()))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(donation_id): Path<String>,
) -> Result<Json<DonationResponse>, ApiError> {
    let id = parse_id(&donation_id)?;
    let donation = state.donations.get_donation(id).await?;
    Ok(Json(to_response(donation)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(donation_id): Path<String>,
    Json(body): Json<UpdateDonationRequest>,
) -> Result<Json<DonationResponse>, ApiError> {
    let id = parse_id(&donation_id)?;
    let editor = auth.profile(&state).await?;

    let patch = DonationPatch {
        food_name: body.food_name,
        description: body.description,
        quantity: body.quantity,
        unit: body.unit,
        category: body.category,
        allergens: body.allergens,
        expiry_time: body.expiry_time.map(bson::DateTime::from_chrono),
        pickup_start: body.pickup_start.map(bson::DateTime::from_chrono),
        pickup_end: body.pickup_end.map(bson::DateTime::from_chrono),
        address: body.address,
        latitude: body.latitude,
        longitude: body.longitude,
        images: body.images,
        special_instructions: body.special_instructions,
    };
    let donation = state.donations.update_donation(id, &editor, patch).await?;
    Ok(Json(to_response(donation)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(donation_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&donation_id)?;
    let donor = auth.profile(&state).await?;
    state.donations.delete_donation(id, &donor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn claim(
    state: State<AppState>,
    auth: AuthUser,
    path: Path<String>,
    query: Query<ActionQuery>,
) -> Result<Json<DonationResponse>, ApiError> {
    act(state, auth, path, query, DonationAction::Claim).await
}

pub async fn cancel(
    state: State<AppState>,
    auth: AuthUser,
    path: Path<String>,
    query: Query<ActionQuery>,
) -> Result<Json<DonationResponse>, ApiError> {
    act(state, auth, path, query, DonationAction::Cancel).await
}

pub async fn en_route(
    state: State<AppState>,
    auth: AuthUser,
    path: Path<String>,
    query: Query<ActionQuery>,
) -> Result<Json<DonationResponse>, ApiError> {
    act(state, auth, path, query, DonationAction::MarkEnRoute).await
}

pub async fn collected(
    state: State<AppState>,
    auth: AuthUser,
    path: Path<String>,
    query: Query<ActionQuery>,
) -> Result<Json<DonationResponse>, ApiError> {
    act(state, auth, path, query, DonationAction::MarkCollected).await
}

pub async fn delivered(
    state: State<AppState>,
    auth: AuthUser,
    path: Path<String>,
    query: Query<ActionQuery>,
) -> Result<Json<DonationResponse>, ApiError> {
    act(state, auth, path, query, DonationAction::MarkDelivered).await
}

async fn act(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(donation_id): Path<String>,
    Query(query): Query<ActionQuery>,
    action: DonationAction,
) -> Result<Json<DonationResponse>, ApiError> {
    let id = parse_id(&donation_id)?;
    let user = auth.profile(&state).await?;
    let donation = state
        .donations
        .apply_action(id, &user, action, query.notes)
        .await?;
    Ok(Json(to_response(donation)))
}

pub async fn history(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(donation_id): Path<String>,
) -> Result<Json<Vec<StatusHistoryResponse>>, ApiError> {
    let id = parse_id(&donation_id)?;
    let entries = state.donations.get_status_history(id).await?;
    Ok(Json(entries.into_iter().map(history_response).collect()))
}

fn parse_id(raw: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw).map_err(|_| ApiError::BadRequest("Invalid donation_id".to_string()))
}

fn rfc3339(dt: bson::DateTime) -> String {
    dt.try_to_rfc3339_string().unwrap_or_default()
}

fn browse_response(item: BrowseItem) -> DonationResponse {
    let mut response = to_response(item.donation);
    response.distance_km = item.distance_km;
    response.distance = item.distance_km.map(format_distance);
    response
}

fn to_response(d: Donation) -> DonationResponse {
    DonationResponse {
        id: d.id.map(|id| id.to_hex()).unwrap_or_default(),
        donor_id: d.donor_id.to_hex(),
        donor_name: d.donor_name,
        donor_phone: d.donor_phone,
        food_name: d.food_name,
        description: d.description,
        quantity: d.quantity,
        unit: d.unit,
        category: d.category,
        allergens: d.allergens,
        expiry_time: rfc3339(d.expiry_time),
        pickup_start: rfc3339(d.pickup_start),
        pickup_end: rfc3339(d.pickup_end),
        address: d.address,
        latitude: d.latitude,
        longitude: d.longitude,
        images: d.images,
        special_instructions: d.special_instructions,
        status: d.status,
        claimed_by: d.claimed_by.map(|id| id.to_hex()),
        claimed_by_name: d.claimed_by_name,
        claimed_at: d.claimed_at.map(rfc3339),
        created_at: rfc3339(d.created_at),
        updated_at: rfc3339(d.updated_at),
        distance_km: None,
        distance: None,
    }
}

fn history_response(h: StatusHistory) -> StatusHistoryResponse {
    StatusHistoryResponse {
        id: h.id.map(|id| id.to_hex()).unwrap_or_default(),
        donation_id: h.donation_id.to_hex(),
        status: h.status,
        changed_by: h.changed_by.to_hex(),
        changed_by_name: h.changed_by_name,
        notes: h.notes,
        created_at: rfc3339(h.created_at),
    }
}
