// handlers/protected/mod.rs - Protected handlers (JWT authentication required)
//
// Route prefix: /api/*. jwt_auth_middleware puts an AuthUser in the request
// extensions; every handler here is a write and checks that the caller owns
// the researcher, publication or project being changed.

pub mod projects;
pub mod publications;
pub mod researchers;
