use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::orcid::OrcidId;

/// Session token claims. `sub` is the signed-in researcher's ORCID iD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(orcid_id: &OrcidId, name: Option<String>) -> Self {
        let expiry_hours = config::config().security.jwt_expiry_hours;
        Self::with_expiry(orcid_id, name, expiry_hours)
    }

    pub fn with_expiry(orcid_id: &OrcidId, name: Option<String>, expiry_hours: u64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            sub: orcid_id.to_string(),
            name,
            exp,
            iat: now.timestamp(),
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidSecret,
    Invalid(String),
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidSecret => write!(f, "Invalid JWT secret"),
            JwtError::Invalid(msg) => write!(f, "Invalid JWT token: {}", msg),
        }
    }
}

impl std::error::Error for JwtError {}

pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    encode_with_secret(claims, &config::config().security.jwt_secret)
}

pub fn encode_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    decode_with_secret(token, &config::config().security.jwt_secret)
}

pub fn decode_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data =
        decode::<Claims>(token, &decoding_key, &Validation::default()).map_err(|e| JwtError::Invalid(e.to_string()))?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orcid() -> OrcidId {
        OrcidId::parse("0000-0002-1825-0097").unwrap()
    }

    #[test]
    fn token_round_trips_with_same_secret() {
        let claims = Claims::with_expiry(&orcid(), Some("Josiah Carberry".into()), 1);
        let token = encode_with_secret(&claims, "s3cret").unwrap();
        let decoded = decode_with_secret(&token, "s3cret").unwrap();
        assert_eq!(decoded.sub, "0000-0002-1825-0097");
        assert_eq!(decoded.name.as_deref(), Some("Josiah Carberry"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let claims = Claims::with_expiry(&orcid(), None, 1);
        let token = encode_with_secret(&claims, "s3cret").unwrap();
        assert!(matches!(decode_with_secret(&token, "other"), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let mut claims = Claims::with_expiry(&orcid(), None, 1);
        claims.exp = Utc::now().timestamp() - 3600;
        let token = encode_with_secret(&claims, "s3cret").unwrap();
        assert!(matches!(decode_with_secret(&token, "s3cret"), Err(JwtError::Invalid(_))));
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims::with_expiry(&orcid(), None, 1);
        assert!(matches!(encode_with_secret(&claims, ""), Err(JwtError::InvalidSecret)));
    }
}
