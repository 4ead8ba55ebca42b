//! Access tokens and password hashing.
//!
//! Tokens are HS256 JWTs carrying the user name. Expiry is checked against the
//! injected [`Clock`] rather than inside `jsonwebtoken`, so tests can pin time.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cache::Clock;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token is not valid: {0}")]
    InvalidToken(String),
    #[error("token expired")]
    Expired,
    #[error("token could not be issued: {0}")]
    Issue(String),
    #[error("password hashing failed: {0}")]
    Hashing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub name: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            clock,
        }
    }

    pub fn issue(&self, user_name: &str) -> Result<String, AuthError> {
        let iat = self.clock.now().unix_timestamp();
        let claims = Claims {
            name: user_name.to_string(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|err| AuthError::Issue(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string()]);

        let claims = decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|err| AuthError::InvalidToken(err.to_string()))?
            .claims;

        if self.clock.now().unix_timestamp() >= claims.exp {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}

/// bcrypt hashing, run on the blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let cost = self.cost;
        let password = password.to_string();
        tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
            .await
            .map_err(|err| AuthError::Hashing(err.to_string()))?
            .map_err(|err| AuthError::Hashing(err.to_string()))
    }

    pub async fn verify(&self, password: &str, hashed: &str) -> Result<bool, AuthError> {
        let password = password.to_string();
        let hashed = hashed.to_string();
        tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed))
            .await
            .map_err(|err| AuthError::Hashing(err.to_string()))?
            .map_err(|err| AuthError::Hashing(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    use time::OffsetDateTime;
    use time::macros::datetime;

    struct FixedClock(Mutex<OffsetDateTime>);

    impl Clock for FixedClock {
        fn now(&self) -> OffsetDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn tokens(clock: Arc<FixedClock>) -> TokenService {
        TokenService::new("test-secret", Duration::from_secs(3600), clock)
    }

    #[test]
    fn issued_token_round_trips_claims() {
        let clock = Arc::new(FixedClock(Mutex::new(datetime!(2024-03-01 12:00 UTC))));
        let service = tokens(clock);

        let token = service.issue("admin").unwrap();
        let claims = service.verify(&token).unwrap();

        assert_eq!(claims.name, "admin");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn token_expires_after_ttl() {
        let clock = Arc::new(FixedClock(Mutex::new(datetime!(2024-03-01 12:00 UTC))));
        let service = tokens(clock.clone());
        let token = service.issue("admin").unwrap();

        *clock.0.lock().unwrap() = datetime!(2024-03-01 13:00 UTC);
        assert!(matches!(service.verify(&token), Err(AuthError::Expired)));
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let clock = Arc::new(FixedClock(Mutex::new(datetime!(2024-03-01 12:00 UTC))));
        let other = TokenService::new("other-secret", Duration::from_secs(3600), clock.clone());
        let token = other.issue("admin").unwrap();

        assert!(matches!(
            tokens(clock).verify(&token),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        let clock = Arc::new(FixedClock(Mutex::new(datetime!(2024-03-01 12:00 UTC))));
        assert!(tokens(clock).verify("not.a.token").is_err());
    }

    #[tokio::test]
    async fn password_hash_verifies_only_the_hashed_password() {
        let hasher = PasswordHasher::new(4);
        let hashed = hasher.hash("hunter2").await.unwrap();

        assert_ne!(hashed, "hunter2");
        assert!(hasher.verify("hunter2", &hashed).await.unwrap());
        assert!(!hasher.verify("hunter3", &hashed).await.unwrap());
    }
}
