use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::routes::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub username: String,
    pub exp: usize,
}

#[derive(thiserror::Error, Debug)]
pub enum TokenError {
    #[error("token expiry out of range")]
    ExpiryOutOfRange,
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Signs and validates HS256 access tokens.
#[derive(Clone)]
pub struct TokenManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_token_age_secs: i64,
}

impl TokenManager {
    pub fn new(secret: &str, access_token_age_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            access_token_age_secs,
        }
    }

    pub fn create_access_token(&self, user_id: &str, username: &str) -> Result<String, TokenError> {
        let exp = chrono::Duration::try_seconds(self.access_token_age_secs)
            .and_then(|age| chrono::Utc::now().checked_add_signed(age))
            .ok_or(TokenError::ExpiryOutOfRange)?
            .timestamp()
            .max(0) as usize;
        let claims = Claims { sub: user_id.to_string(), username: username.to_string(), exp };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Validate a JWT and return its claims.
    pub fn decode(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        Ok(decode::<Claims>(token, &self.decoding, &validation)?.claims)
    }
}

/// Extractor yielding validated `Claims`.
pub struct Auth(pub Claims);

impl Auth {
    pub fn user_id(&self) -> &str {
        &self.0.sub
    }
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>() else {
            tracing::error!("AppState missing from app data");
            return ready(Err(ApiError::Internal));
        };
        // Delegate to BearerAuth to parse the header.
        if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
            return ready(match state.tokens.decode(bearer.token()) {
                Ok(claims) => Ok(Auth(claims)),
                Err(_) => Err(ApiError::Unauthorized("invalid access token".into())),
            });
        }
        ready(Err(ApiError::Unauthorized("missing authentication".into())))
    }
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::Internal
        })
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, ApiError> {
    let parsed = PasswordHash::new(password_hash).map_err(|e| {
        tracing::error!(error = %e, "stored password hash is malformed");
        ApiError::Internal
    })?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            tracing::error!(error = %e, "password verification failed");
            Err(ApiError::Internal)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip_carries_identity() {
        let tm = TokenManager::new("test-secret-must-be-32-bytes-long!!", 3600);
        let token = tm.create_access_token("user-1", "dicoding").unwrap();
        let claims = tm.decode(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "dicoding");
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let a = TokenManager::new("test-secret-must-be-32-bytes-long!!", 3600);
        let b = TokenManager::new("another-secret-that-is-32-bytes-long", 3600);
        let token = a.create_access_token("user-1", "dicoding").unwrap();
        assert!(b.decode(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let tm = TokenManager::new("test-secret-must-be-32-bytes-long!!", -3600);
        let token = tm.create_access_token("user-1", "dicoding").unwrap();
        assert!(tm.decode(&token).is_err());
    }

    #[test]
    fn oversized_age_is_an_error_not_a_panic() {
        let tm = TokenManager::new("test-secret-must-be-32-bytes-long!!", 1_000_000_000_000_000);
        assert!(matches!(tm.create_access_token("user-1", "u"), Err(TokenError::ExpiryOutOfRange)));
        let tm = TokenManager::new("test-secret-must-be-32-bytes-long!!", i64::MAX);
        assert!(matches!(tm.create_access_token("user-1", "u"), Err(TokenError::ExpiryOutOfRange)));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("secret").unwrap();
        assert_ne!(hash, "secret");
        assert!(verify_password("secret", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }
}
