pub mod auth;
pub mod caller;
pub mod extract;
pub mod rate_limit;
