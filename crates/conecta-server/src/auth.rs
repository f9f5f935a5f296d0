//! Credential handling: argon2id password hashing, HS256 session tokens,
//! and Google ID-token verification for social login.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

use conecta_core::ids::UserId;
use conecta_core::security::TokenSecret;

/// Sessions expire after a week; there is no refresh flow.
pub const TOKEN_TTL_DAYS: i64 = 7;

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("token error: {0}")]
    Token(String),

    /// Wrong password or unknown email. Deliberately carries no detail.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("google verification failed: {0}")]
    GoogleVerification(String),
}

// ── Passwords ──

/// Hash a password with argon2id default params, returning a PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Verify a password against a stored PHC string.
pub fn verify_password(password: &str, phc: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(phc).map_err(|e| AuthError::Hashing(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

// ── Session tokens ──

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// The user ID.
    pub sub: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a signed HS256 token for the given user.
pub fn issue_token(
    user_id: &UserId,
    email: &str,
    secret: &TokenSecret,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::days(TOKEN_TTL_DAYS)).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.0.expose_secret().as_bytes()),
    )
    .map_err(|e| AuthError::Token(e.to_string()))
}

/// Verify a token's signature and expiry; returns its claims.
pub fn verify_token(token: &str, secret: &TokenSecret) -> Result<Claims, AuthError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.0.expose_secret().as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|_| AuthError::InvalidCredentials)
}

// ── Google social login ──

/// Identity asserted by a verified Google ID token.
#[derive(Clone, Debug, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Audience the token was minted for; must match our client ID.
    pub aud: String,
}

/// Verify a Google ID token against the hosted `tokeninfo` endpoint.
/// The endpoint validates signature and expiry; we additionally check
/// the audience so tokens minted for other apps are rejected.
pub async fn verify_google_id_token(
    http: &reqwest::Client,
    id_token: &str,
    client_id: &str,
) -> Result<GoogleProfile, AuthError> {
    let response = http
        .get(GOOGLE_TOKENINFO_URL)
        .query(&[("id_token", id_token)])
        .send()
        .await
        .map_err(|e| AuthError::GoogleVerification(e.to_string()))?;

    if !response.status().is_success() {
        return Err(AuthError::GoogleVerification(format!(
            "tokeninfo returned {}",
            response.status()
        )));
    }

    let profile: GoogleProfile = response
        .json()
        .await
        .map_err(|e| AuthError::GoogleVerification(e.to_string()))?;

    if profile.aud != client_id {
        return Err(AuthError::GoogleVerification(
            "token audience does not match the configured client ID".into(),
        ));
    }

    Ok(profile)
}
