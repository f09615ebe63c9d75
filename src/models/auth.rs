use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by the identity provider's access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // identity UUID
    pub email: String,
    pub exp: usize,
    #[serde(default)]
    pub iat: usize,
}

/// Extracted from the validated JWT, available via Axum extractors
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
}
