// handlers/mod.rs - HTTP handlers in two security tiers
//
// Public (no auth): service info, health, ORCID sign-in, live ORCID proxy and
// read-only views of the local cache.
// Protected (JWT): every write on a researcher's data. The router wraps these
// in jwt_auth_middleware and each handler checks ownership.

pub mod protected;
pub mod public;

use uuid::Uuid;

use crate::error::ApiError;
use crate::orcid::OrcidId;

/// Path segment → ORCID iD, 400 when malformed.
pub(crate) fn parse_orcid(raw: &str) -> Result<OrcidId, ApiError> {
    Ok(OrcidId::parse(raw)?)
}

/// Path segment → UUID, 400 when malformed.
pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {} id: {}", what, raw)))
}

pub(crate) fn parse_put_code(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|code| *code > 0)
        .ok_or_else(|| ApiError::bad_request(format!("Invalid put-code: {}", raw)))
}
