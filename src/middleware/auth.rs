use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::auth::{validate_jwt, Claims};
use crate::error::ApiError;
use crate::orcid::OrcidId;

/// Signed-in researcher extracted from the session JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub orcid_id: OrcidId,
    pub name: Option<String>,
}

impl TryFrom<Claims> for AuthUser {
    type Error = ApiError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let orcid_id = OrcidId::parse(&claims.sub)
            .map_err(|_| ApiError::unauthorized("Token subject is not an ORCID iD"))?;
        Ok(Self {
            orcid_id,
            name: claims.name,
        })
    }
}

impl AuthUser {
    /// Writes on a researcher's data are only allowed for that researcher.
    pub fn ensure_owner(&self, owner: &str) -> Result<(), ApiError> {
        if self.orcid_id.as_str() == owner {
            Ok(())
        } else {
            Err(ApiError::forbidden("You can only modify your own profile data"))
        }
    }
}

/// JWT authentication middleware that validates tokens and extracts user context
pub async fn jwt_auth_middleware(headers: HeaderMap, mut request: Request, next: Next) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(&headers).map_err(ApiError::unauthorized)?;
    let claims = validate_jwt(&token)?;
    let auth_user = AuthUser::try_from(claims)?;

    tracing::debug!("Authenticated request for {}", auth_user.orcid_id);
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Extract JWT token from Authorization header
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| "Missing Authorization header".to_string())?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format".to_string())?;

    if let Some(token) = auth_str.strip_prefix("Bearer ") {
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        Ok(token.trim().to_string())
    } else {
        Err("Authorization header must use Bearer token format".to_string())
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
