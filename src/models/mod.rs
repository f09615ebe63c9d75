pub mod auth;
pub mod chat;
pub mod document;
pub mod invitation;
pub mod school;
pub mod session_log;
pub mod user;
