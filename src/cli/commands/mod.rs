pub mod auth;
pub mod query;
pub mod template;
