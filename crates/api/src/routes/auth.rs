use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
};
use foodshare_db::models::{Role, User};
use foodshare_services::auth::{ProfileUpdate, Session, SignupRequest};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub role: Role,
    pub display_name: String,
    pub phone: String,
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub profile_picture: Option<String>,
    pub organization_name: Option<String>,
    pub registration_number: Option<String>,
    pub organization_description: Option<String>,
    pub is_verified: bool,
    pub email_verified: bool,
    pub dashboard: String,
    pub created_at: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordResetConfirm {
    pub token: String,
    pub password: String,
    pub confirm_password: String,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(body): Json<SignupRequest>,
) -> Result<(StatusCode, HeaderMap, Json<AuthResponse>), ApiError> {
    let session = state.accounts.signup(body).await?;
    let (headers, response) = session_response(session)?;
    Ok((StatusCode::CREATED, headers, Json(response)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let session = state.accounts.login(&body.email, &body.password).await?;
    let (headers, response) = session_response(session)?;
    Ok((headers, Json(response)))
}

pub async fn logout() -> Result<HeaderMap, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("access_token=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0"),
    );
    Ok(headers)
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> Result<(HeaderMap, Json<AuthResponse>), ApiError> {
    let session = state.accounts.refresh(&body.refresh_token).await?;
    let (headers, response) = session_response(session)?;
    Ok((headers, Json(response)))
}

pub async fn me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserResponse>, ApiError> {
    let user = auth.profile(&state).await?;
    Ok(Json(to_response(user)))
}

pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.accounts.update_profile(auth.user_id, body).await?;
    Ok(Json(to_response(user)))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.accounts.verify_email(&body.token).await?;
    Ok(Json(to_response(user)))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    state.accounts.resend_verification(auth.user_id).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn request_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetRequest>,
) -> Result<StatusCode, ApiError> {
    state.accounts.request_password_reset(&body.email).await?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(body): Json<PasswordResetConfirm>,
) -> Result<StatusCode, ApiError> {
    state
        .accounts
        .reset_password(&body.token, &body.password, &body.confirm_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

fn session_response(session: Session) -> Result<(HeaderMap, AuthResponse), ApiError> {
    let mut headers = HeaderMap::new();
    let cookie = format!(
        "access_token={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        session.tokens.access_token, session.tokens.expires_in
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(format!("invalid session cookie: {e}")))?;
    headers.insert(header::SET_COOKIE, cookie);

    let response = AuthResponse {
        access_token: session.tokens.access_token,
        refresh_token: session.tokens.refresh_token,
        expires_in: session.tokens.expires_in,
        user: to_response(session.user),
    };
    Ok((headers, response))
}

pub fn to_response(u: User) -> UserResponse {
    let organization = u.organization.clone();
    UserResponse {
        id: u.id.map(|id| id.to_hex()).unwrap_or_default(),
        dashboard: u.role.dashboard_path().to_string(),
        email: u.email,
        role: u.role,
        display_name: u.display_name,
        phone: u.phone,
        address: u.address,
        latitude: u.latitude,
        longitude: u.longitude,
        profile_picture: u.profile_picture,
        organization_name: organization.as_ref().map(|o| o.name.clone()),
        registration_number: organization.as_ref().and_then(|o| o.registration_number.clone()),
        organization_description: organization.and_then(|o| o.description),
        is_verified: u.is_verified,
        email_verified: u.email_verified,
        created_at: u.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}
