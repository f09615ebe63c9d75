use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    error::AppError,
    models::auth::AuthenticatedUser,
    services::roles::{Caller, RoleService},
    AppState,
};

/// Authenticates the bearer token and resolves the caller's role. Roles are
/// looked up on every request and never cached.
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        RoleService::caller(state.store.as_ref(), &user).await
    }
}
