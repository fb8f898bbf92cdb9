pub mod account;
pub mod cooldown;
pub mod mailer;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use argon2::password_hash::rand_core::OsRng;
use bson::oid::ObjectId;
use chrono::{Duration, Utc};
use foodshare_config::JwtSettings;
use foodshare_db::models::Role;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dao::base::DaoError;

pub use account::{AccountService, ProfileUpdate, Session, SignupRequest};
pub use cooldown::EmailCooldown;
pub use mailer::{LogMailer, Mailer, OutboxMailer, OutgoingMail};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("User not found")]
    UserNotFound,
    #[error("Email already registered")]
    EmailInUse,
    #[error("Weak password: {0}")]
    WeakPassword(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Too many requests, retry in {retry_after_secs}s")]
    TooManyRequests { retry_after_secs: u64 },
    #[error("Invalid or expired link")]
    InvalidLink,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid token: {0}")]
    InvalidToken(String),
    #[error("Password hash error: {0}")]
    HashError(String),
    #[error("Mail delivery failed: {0}")]
    Mail(String),
    #[error(transparent)]
    Dao(#[from] DaoError),
}

impl AuthError {
    /// Message safe to show to the person signing in.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Incorrect email or password.".to_string(),
            AuthError::UserNotFound => "No account found with this email.".to_string(),
            AuthError::EmailInUse => "An account with this email already exists.".to_string(),
            AuthError::WeakPassword(reason) => format!("Password is too weak: {reason}."),
            AuthError::Validation(reason) => reason.clone(),
            AuthError::TooManyRequests { retry_after_secs } => {
                format!("Too many requests. Please wait {retry_after_secs} seconds and try again.")
            }
            AuthError::InvalidLink => "This link is invalid or has expired.".to_string(),
            AuthError::TokenExpired | AuthError::InvalidToken(_) => {
                "Your session has expired. Please sign in again.".to_string()
            }
            AuthError::HashError(_) | AuthError::Mail(_) | AuthError::Dao(_) => {
                "Something went wrong. Please try again.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub token_type: TokenType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

/// Password hashing and JWT session tokens.
pub struct AuthService {
    jwt_settings: JwtSettings,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl AuthService {
    pub fn new(jwt_settings: JwtSettings) -> Self {
        let encoding_key = EncodingKey::from_secret(jwt_settings.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(jwt_settings.secret.as_bytes());
        Self {
            jwt_settings,
            encoding_key,
            decoding_key,
        }
    }

    pub fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| AuthError::HashError(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    pub fn generate_tokens(
        &self,
        user_id: ObjectId,
        email: &str,
        role: Role,
    ) -> Result<TokenPair, AuthError> {
        let access_token = self.sign(
            user_id,
            email,
            role,
            TokenType::Access,
            self.jwt_settings.access_token_ttl_secs,
        )?;
        let refresh_token = self.sign(
            user_id,
            email,
            role,
            TokenType::Refresh,
            self.jwt_settings.refresh_token_ttl_secs,
        )?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.jwt_settings.access_token_ttl_secs,
        })
    }

    fn sign(
        &self,
        user_id: ObjectId,
        email: &str,
        role: Role,
        token_type: TokenType,
        ttl_secs: u64,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_hex(),
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + Duration::seconds(ttl_secs as i64)).timestamp(),
            iss: self.jwt_settings.issuer.clone(),
            token_type,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.jwt_settings.issuer]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            },
        )?;

        Ok(token_data.claims)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify_token(token)?;
        if claims.token_type != TokenType::Access {
            return Err(AuthError::InvalidToken("Not an access token".to_string()));
        }
        Ok(claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> Result<Claims, AuthError> {
        let claims = self.verify_token(token)?;
        if claims.token_type != TokenType::Refresh {
            return Err(AuthError::InvalidToken("Not a refresh token".to_string()));
        }
        Ok(claims)
    }
}
