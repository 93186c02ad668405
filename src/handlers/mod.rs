// handlers/mod.rs - Handler tiers
//
// Public (no auth) -> Protected (JWT auth, /api/*)
pub mod protected;
pub mod public;
