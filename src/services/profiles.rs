use serde::Serialize;

use crate::{
    db::Store,
    error::AppResult,
    models::user::Profile,
    services::{
        roles::{Caller, ResolvedRole},
        validation::{name_from_email, required_text, MAX_NAME_LEN},
    },
};

/// What `GET /me` reports: the stored profile, if any, and the resolved role.
#[derive(Debug, Serialize)]
pub struct Me {
    pub user_id: uuid::Uuid,
    pub email: String,
    pub profile: Option<Profile>,
    pub role: Option<ResolvedRole>,
}

pub struct ProfileService;

impl ProfileService {
    pub async fn me(store: &dyn Store, caller: &Caller) -> AppResult<Me> {
        Ok(Me {
            user_id: caller.user_id,
            email: caller.email.clone(),
            profile: store.get_profile(caller.user_id).await?,
            role: caller.role,
        })
    }

    /// Creates or renames the caller's profile. The email always comes from
    /// the verified token.
    pub async fn upsert(store: &dyn Store, caller: &Caller, full_name: &str) -> AppResult<Profile> {
        let full_name = required_text("Full name", full_name, MAX_NAME_LEN)?;
        let email = Self::token_email(caller)?;
        store.upsert_profile(caller.user_id, &full_name, &email).await
    }

    /// Makes sure the caller has a profile row before writing rows that
    /// reference it. A missing profile is created from the token's email.
    pub async fn ensure(store: &dyn Store, caller: &Caller) -> AppResult<Profile> {
        if let Some(profile) = store.get_profile(caller.user_id).await? {
            return Ok(profile);
        }
        let email = Self::token_email(caller)?;
        store.ensure_profile(caller.user_id, &name_from_email(&email), &email).await
    }

    pub(crate) fn token_email(caller: &Caller) -> AppResult<String> {
        required_text("Email", &caller.email, MAX_NAME_LEN)
    }
}
