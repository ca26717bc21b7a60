use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::{info, warn};
use uuid::Uuid;

use solace_types::api::{AuthResponse, Claims, LoginRequest, RegisterRequest};
use solace_types::models::User;

use crate::error::ApiError;
use crate::{AppState, blocking};

const MIN_PASSWORD_LEN: usize = 8;
const MAX_NAME_LEN: usize = 64;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = normalize_email(&req.email)?;
    let name = req.name.trim().to_string();
    if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::BadRequest(format!(
            "Name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    if req.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let user_id = Uuid::new_v4();
    let is_professional = req.is_professional;
    let password = req.password;
    let user_email = email.clone();
    let created = blocking(&state, move |db| {
        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
            .to_string();

        db.create_user(user_id, &user_email, &password_hash, &name, is_professional)
    })
    .await?;

    let user = match created {
        Some(user) => user,
        None => {
            warn!("Registration rejected, email already in use: {}", email);
            return Err(ApiError::Conflict("Email already registered"));
        }
    };

    let token = create_token(&state.jwt_secret, &user)?;
    info!("Registered {} ({}), professional={}", user.email, user.id, user.is_professional);

    Ok((StatusCode::CREATED, Json(AuthResponse { user, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let email = req.email.trim().to_lowercase();
    let password = req.password;

    let user = blocking(&state, move |db| {
        let Some(creds) = db.get_credentials(&email)? else {
            return Ok(None);
        };

        let parsed_hash = PasswordHash::new(&creds.password_hash)
            .map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
        let verified = Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok();

        Ok(verified.then_some(creds.user))
    })
    .await?
    .ok_or(ApiError::InvalidCredentials)?;

    let token = create_token(&state.jwt_secret, &user)?;
    info!("{} ({}) signed in", user.email, user.id);

    Ok(Json(AuthResponse { user, token }))
}

/// Tokens are stateless; sign-out is acknowledged and logged.
pub async fn logout(Extension(claims): Extension<Claims>) -> StatusCode {
    info!("{} ({}) signed out", claims.email, claims.sub);
    StatusCode::NO_CONTENT
}

/// The caller's profile row, the authority for the professional flag.
pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<User>, ApiError> {
    let user = blocking(&state, move |db| db.get_user(claims.sub))
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(user))
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if !valid {
        return Err(ApiError::BadRequest("A valid email address is required".into()));
    }
    Ok(email)
}

fn create_token(secret: &str, user: &User) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
