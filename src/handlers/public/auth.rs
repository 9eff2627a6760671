// handlers/public/auth.rs - ORCID OAuth sign-in

use axum::{extract::rejection::JsonRejection, Json};
use serde::{Deserialize, Serialize};

use crate::auth::{generate_jwt, Claims};
use crate::config;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::orcid::{OrcidClient, OrcidId};
use crate::services::ResearcherService;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub code: String,
    pub redirect_uri: String,
}

#[derive(Debug, Serialize)]
pub struct SessionToken {
    pub token: String,
    pub orcid_id: OrcidId,
    pub name: Option<String>,
    pub expires_in: u64,
}

/// POST /auth/orcid/callback - trade an authorization code for a session token
///
/// The ORCID iD in the token response becomes the JWT subject. A bare user
/// row is created on first sign-in so the researcher can be synced later.
pub async fn orcid_callback(payload: Result<Json<CallbackRequest>, JsonRejection>) -> ApiResult<SessionToken> {
    let Json(request) = payload?;
    let code = request.code.trim();
    let redirect_uri = request.redirect_uri.trim();
    if code.is_empty() {
        return Err(ApiError::bad_request("Authorization code is required"));
    }
    if redirect_uri.is_empty() {
        return Err(ApiError::bad_request("redirect_uri is required"));
    }

    let client = OrcidClient::shared()?;
    let grant = client.exchange_code(code, redirect_uri).await?;
    let orcid_id = OrcidId::parse(&grant.orcid)?;

    ResearcherService::connect()
        .await?
        .ensure_stub(&orcid_id, grant.name.as_deref())
        .await?;

    let expiry_hours = config::config().security.jwt_expiry_hours;
    let claims = Claims::with_expiry(&orcid_id, grant.name.clone(), expiry_hours);
    let token = generate_jwt(&claims)?;

    tracing::info!("Signed in {}", orcid_id);
    Ok(ApiResponse::success(SessionToken {
        token,
        orcid_id,
        name: grant.name,
        expires_in: expiry_hours * 3600,
    }))
}
