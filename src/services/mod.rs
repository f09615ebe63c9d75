pub mod chat;
pub mod codes;
pub mod documents;
pub mod email;
pub mod expiry;
pub mod invitations;
pub mod metrics;
pub mod notifications;
pub mod profiles;
pub mod roles;
pub mod schools;
pub mod sessions;
pub mod students;
pub mod teachers;
pub mod validation;
