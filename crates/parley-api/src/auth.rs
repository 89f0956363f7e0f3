use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, SecondsFormat, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use parley_db::Database;
use parley_db::models::UserRow;
use parley_mail::{Mailer, OtpMail};
use parley_types::api::{
    Claims, SigninRequest, SigninResponse, SignupRequest, SignupResponse, VerifyOtpRequest,
    VerifyOtpResponse,
};

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub mailer: Mailer,
    pub jwt_secret: String,
    pub otp_ttl: Duration,
}

pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.trim().is_empty() || req.email.trim().is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation);
    }

    if let Some(existing) = state.db.get_user_by_email(&req.email)? {
        if existing.otp_verified {
            return Err(ApiError::DuplicateEmail);
        }

        // Unverified user signing up again: overwrite the pending code and
        // resend. Concurrent signups race last-write-wins on the OTP value.
        let otp = generate_otp();
        state.db.set_otp(&req.email, &otp, &otp_expiry(state.otp_ttl))?;
        send_otp(&state, &existing.username, &req.email, &otp).await?;

        return Ok((
            StatusCode::OK,
            Json(SignupResponse {
                message: "OTP resent to email".into(),
            }),
        ));
    }

    // Hash password with Argon2id
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow!("password hashing failed: {e}")))?
        .to_string();

    let user_id = Uuid::new_v4();
    let otp = generate_otp();

    // The user row is persisted before mail dispatch; a failed send leaves
    // the row behind and the caller recovers through the resend path.
    state.db.create_user(
        &user_id.to_string(),
        &req.username,
        &req.email,
        &password_hash,
        &otp,
        &otp_expiry(state.otp_ttl),
    )?;

    info!(email = %req.email, "user created, dispatching OTP");
    send_otp(&state, &req.username, &req.email, &otp).await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            message: "User created, OTP sent to email".into(),
        }),
    ))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or(ApiError::NotFound)?;

    if !otp_matches(&user, &req.otp) {
        return Err(ApiError::InvalidOtp);
    }

    state.db.mark_verified(&req.email)?;

    Ok(Json(VerifyOtpResponse {
        message: "OTP verified successfully".into(),
    }))
}

pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SigninRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state
        .db
        .get_user_by_email(&req.email)?
        .ok_or(ApiError::NotFound)?;

    // Checked before the password comparison so an unverified caller learns
    // nothing about credential validity.
    if !user.otp_verified {
        return Err(ApiError::UnverifiedAccount);
    }

    let parsed_hash = PasswordHash::new(&user.password)
        .map_err(|e| ApiError::Internal(anyhow!("stored password hash unreadable: {e}")))?;

    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let user_id: Uuid = user
        .id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow!("corrupt user id '{}': {e}", user.id)))?;

    let token = create_token(&state.jwt_secret, user_id, &user.username)?;

    Ok(Json(SigninResponse {
        token,
        user_id,
        username: user.username,
        email: user.email,
    }))
}

/// Six-digit numeric one-time code.
fn generate_otp() -> String {
    format!("{:06}", rand::rng().random_range(0..1_000_000))
}

fn otp_expiry(ttl: Duration) -> String {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::seconds(300));
    (Utc::now() + ttl).to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Strict match: the stored code must equal the candidate exactly and the
/// expiry must not have passed. No tolerance window.
fn otp_matches(user: &UserRow, candidate: &str) -> bool {
    let (Some(stored), Some(expires_at)) = (user.otp.as_deref(), user.otp_expires_at.as_deref())
    else {
        return false;
    };
    if stored != candidate {
        return false;
    }
    let Ok(expires_at) = expires_at.parse::<DateTime<Utc>>() else {
        return false;
    };
    Utc::now() <= expires_at
}

async fn send_otp(
    state: &AppStateInner,
    username: &str,
    email: &str,
    otp: &str,
) -> Result<(), ApiError> {
    let mail = OtpMail {
        to_email: email.to_string(),
        username: username.to_string(),
        otp: otp.to_string(),
        ttl: state.otp_ttl,
    };
    state
        .mailer
        .send_otp(&mail)
        .await
        .map_err(ApiError::EmailDelivery)
}

fn create_token(secret: &str, user_id: Uuid, username: &str) -> Result<String, ApiError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + chrono::Duration::hours(1)).timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow!("token signing failed: {e}")))
}
