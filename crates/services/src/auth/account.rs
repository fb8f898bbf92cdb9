use std::sync::Arc;
use std::time::Duration;

use bson::oid::ObjectId;
use foodshare_config::AuthSettings;
use foodshare_db::models::{Organization, PendingToken, Role, User};
use rand::distr::{Alphanumeric, SampleString};
use serde::Deserialize;
use tracing::{info, warn};
use validator::{Validate, ValidationError, ValidationErrors};

use super::cooldown::EmailCooldown;
use super::mailer::{Mailer, OutgoingMail};
use super::{AuthError, AuthService, TokenPair};
use crate::dao::base::DaoError;
use crate::dao::user::{NewUser, ProfilePatch, TokenSlot, UserDao};
use crate::stats::{Clock, StatisticsCache};

const VERIFY_MAIL: &str = "verify";
const RESET_MAIL: &str = "reset";
const LINK_TOKEN_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub display_name: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    pub role: Role,
    #[serde(default)]
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub organization_name: Option<String>,
    pub registration_number: Option<String>,
    pub organization_description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, message = "Name is required"))]
    pub display_name: Option<String>,
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub profile_picture: Option<String>,
    pub organization_name: Option<String>,
    pub registration_number: Option<String>,
    pub organization_description: Option<String>,
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    if phone.len() == 10 && phone.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(());
    }
    let mut err = ValidationError::new("phone");
    err.message = Some("Phone number must be exactly 10 digits".into());
    Err(err)
}

fn first_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| errors.to_string())
}

/// Tokens plus the stored profile, returned by every sign-in path.
#[derive(Debug, Clone)]
pub struct Session {
    pub tokens: TokenPair,
    pub user: User,
}

/// Account lifecycle on top of [`AuthService`]: signup, sign-in, profile
/// edits, email verification and password reset.
pub struct AccountService {
    users: Arc<UserDao>,
    auth: Arc<AuthService>,
    stats: Arc<StatisticsCache>,
    mailer: Arc<dyn Mailer>,
    cooldown: EmailCooldown,
    clock: Arc<dyn Clock>,
    settings: AuthSettings,
}

impl AccountService {
    pub fn new(
        users: Arc<UserDao>,
        auth: Arc<AuthService>,
        stats: Arc<StatisticsCache>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        settings: AuthSettings,
    ) -> Self {
        let cooldown = EmailCooldown::new(
            Duration::from_secs(settings.email_cooldown_secs),
            clock.clone(),
        );
        Self {
            users,
            auth,
            stats,
            mailer,
            cooldown,
            clock,
            settings,
        }
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Validates the whole form before touching the store, creates the
    /// account and sends the first verification email.
    pub async fn signup(&self, req: SignupRequest) -> Result<Session, AuthError> {
        req.validate()
            .map_err(|e| AuthError::Validation(first_message(&e)))?;
        self.check_password(&req.password, &req.confirm_password)?;

        let organization = match req.role {
            Role::Ngo => {
                let name = req
                    .organization_name
                    .as_deref()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| {
                        AuthError::Validation("Organization name is required".to_string())
                    })?;
                Some(Organization {
                    name: name.to_string(),
                    registration_number: req.registration_number.clone(),
                    description: req.organization_description.clone(),
                })
            }
            Role::Donor => None,
        };

        let password_hash = self.auth.hash_password(&req.password)?;
        let user = self
            .users
            .create(NewUser {
                email: req.email,
                role: req.role,
                display_name: req.display_name.trim().to_string(),
                phone: req.phone,
                address: req.address,
                latitude: req.latitude,
                longitude: req.longitude,
                organization,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                DaoError::DuplicateKey(_) => AuthError::EmailInUse,
                other => AuthError::Dao(other),
            })?;
        self.stats.invalidate();
        info!(user_id = ?user.id, role = user.role.as_str(), "account created");

        if let Err(e) = self.send_verification_email(&user).await {
            warn!(email = %user.email, error = %e, "verification email not sent at signup");
        }
        self.session_for(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let user = self.users.find_by_email(email).await.map_err(not_found_as_user)?;
        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !self.auth.verify_password(password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }
        self.session_for(user)
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let claims = self.auth.verify_refresh_token(refresh_token)?;
        let user_id = ObjectId::parse_str(&claims.sub)
            .map_err(|_| AuthError::InvalidToken("Invalid user ID".to_string()))?;
        let user = self.me(user_id).await?;
        self.session_for(user)
    }

    /// Stored profile for a session's user id.
    pub async fn me(&self, user_id: ObjectId) -> Result<User, AuthError> {
        self.users.find_by_id(user_id).await.map_err(not_found_as_user)
    }

    pub async fn update_profile(
        &self,
        user_id: ObjectId,
        update: ProfileUpdate,
    ) -> Result<User, AuthError> {
        update
            .validate()
            .map_err(|e| AuthError::Validation(first_message(&e)))?;
        let user = self.me(user_id).await?;

        let organization = if user.role == Role::Ngo
            && (update.organization_name.is_some()
                || update.registration_number.is_some()
                || update.organization_description.is_some())
        {
            let current = user.organization.clone();
            let name = update
                .organization_name
                .or_else(|| current.as_ref().map(|o| o.name.clone()))
                .filter(|n| !n.trim().is_empty())
                .ok_or_else(|| AuthError::Validation("Organization name is required".to_string()))?;
            Some(Organization {
                name,
                registration_number: update
                    .registration_number
                    .or_else(|| current.as_ref().and_then(|o| o.registration_number.clone())),
                description: update
                    .organization_description
                    .or_else(|| current.as_ref().and_then(|o| o.description.clone())),
            })
        } else {
            None
        };

        let patch = ProfilePatch {
            display_name: update.display_name,
            phone: update.phone,
            address: update.address,
            latitude: update.latitude,
            longitude: update.longitude,
            profile_picture: update.profile_picture,
            organization,
        };
        self.users.update_profile(user_id, &patch).await?;
        self.me(user_id).await
    }

    /// Issues a fresh verification link, subject to the per-address cooldown.
    pub async fn send_verification_email(&self, user: &User) -> Result<(), AuthError> {
        if user.email_verified {
            return Err(AuthError::Validation("Email is already verified".to_string()));
        }
        let user_id = user.id.ok_or(AuthError::UserNotFound)?;
        self.cooldown
            .try_acquire(&user.email, VERIFY_MAIL)
            .map_err(|retry_after_secs| AuthError::TooManyRequests { retry_after_secs })?;

        let token = self.issue_link_token();
        self.users
            .set_pending_token(user_id, TokenSlot::Verification, &token)
            .await?;
        self.mail(
            &user.email,
            "Verify your FoodShare email",
            format!(
                "Confirm your address: {}/verify-email?token={}",
                self.settings.public_base_url, token.token
            ),
        )
        .await
    }

    pub async fn resend_verification(&self, user_id: ObjectId) -> Result<(), AuthError> {
        let user = self.me(user_id).await?;
        self.send_verification_email(&user).await
    }

    pub async fn verify_email(&self, token: &str) -> Result<User, AuthError> {
        let user = self
            .users
            .find_by_token(TokenSlot::Verification, token)
            .await
            .map_err(not_found_as_link)?;
        if !self.link_is_live(user.verification.as_ref()) {
            return Err(AuthError::InvalidLink);
        }
        let user_id = user.id.ok_or(AuthError::InvalidLink)?;
        self.users.mark_email_verified(user_id).await?;
        info!(%user_id, "email verified");
        self.me(user_id).await
    }

    pub async fn request_password_reset(&self, email: &str) -> Result<(), AuthError> {
        self.cooldown
            .try_acquire(email, RESET_MAIL)
            .map_err(|retry_after_secs| AuthError::TooManyRequests { retry_after_secs })?;
        let user = self.users.find_by_email(email).await.map_err(not_found_as_user)?;
        let user_id = user.id.ok_or(AuthError::UserNotFound)?;

        let token = self.issue_link_token();
        self.users
            .set_pending_token(user_id, TokenSlot::PasswordReset, &token)
            .await?;
        self.mail(
            &user.email,
            "Reset your FoodShare password",
            format!(
                "Choose a new password: {}/reset-password?token={}",
                self.settings.public_base_url, token.token
            ),
        )
        .await
    }

    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        confirm_password: &str,
    ) -> Result<(), AuthError> {
        self.check_password(new_password, confirm_password)?;
        let user = self
            .users
            .find_by_token(TokenSlot::PasswordReset, token)
            .await
            .map_err(not_found_as_link)?;
        if !self.link_is_live(user.password_reset.as_ref()) {
            return Err(AuthError::InvalidLink);
        }
        let user_id = user.id.ok_or(AuthError::InvalidLink)?;
        let hash = self.auth.hash_password(new_password)?;
        self.users.set_password(user_id, hash).await?;
        info!(%user_id, "password reset");
        Ok(())
    }

    fn check_password(&self, password: &str, confirm: &str) -> Result<(), AuthError> {
        let min = self.settings.min_password_length as usize;
        if password.chars().count() < min {
            return Err(AuthError::WeakPassword(format!(
                "use at least {min} characters"
            )));
        }
        if password != confirm {
            return Err(AuthError::Validation("Passwords do not match".to_string()));
        }
        Ok(())
    }

    fn session_for(&self, user: User) -> Result<Session, AuthError> {
        let user_id = user.id.ok_or(AuthError::UserNotFound)?;
        let tokens = self.auth.generate_tokens(user_id, &user.email, user.role)?;
        Ok(Session { tokens, user })
    }

    fn issue_link_token(&self) -> PendingToken {
        let expires_at = self.clock.now()
            + chrono::Duration::seconds(self.settings.link_ttl_secs as i64);
        PendingToken {
            token: Alphanumeric.sample_string(&mut rand::rng(), LINK_TOKEN_LEN),
            expires_at: bson::DateTime::from_chrono(expires_at),
        }
    }

    fn link_is_live(&self, pending: Option<&PendingToken>) -> bool {
        let now = bson::DateTime::from_chrono(self.clock.now());
        pending.is_some_and(|p| p.expires_at > now)
    }

    async fn mail(&self, to: &str, subject: &str, body: String) -> Result<(), AuthError> {
        self.mailer
            .send(OutgoingMail {
                to: to.to_string(),
                subject: subject.to_string(),
                body,
            })
            .await
            .map_err(|e| AuthError::Mail(e.to_string()))
    }
}

fn not_found_as_user(e: DaoError) -> AuthError {
    match e {
        DaoError::NotFound => AuthError::UserNotFound,
        other => AuthError::Dao(other),
    }
}

fn not_found_as_link(e: DaoError) -> AuthError {
    match e {
        DaoError::NotFound => AuthError::InvalidLink,
        other => AuthError::Dao(other),
    }
}
