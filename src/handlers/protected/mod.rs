// handlers/protected/mod.rs - JWT authentication required (/api/*)
//
// Handlers read the caller from the `AuthUser` extension inserted by
// `jwt_auth_middleware`.
pub mod queries;
