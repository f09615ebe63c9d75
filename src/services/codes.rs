use chrono::Duration;
use rand::{distributions::Alphanumeric, Rng};
use uuid::Uuid;

use crate::{
    clock::Clock,
    db::Store,
    error::{AppError, AppResult},
    models::school::{CodeUpdateOutcome, SchoolCodeResponse, SchoolCodeUpdate},
    services::{metrics::{RATE_LIMIT_REJECTIONS, SCHOOL_CODES_GENERATED}, roles::Caller},
};

/// Code characters. `0 O 1 I L` are left out so codes survive being read aloud.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const SCHOOL_CODE_PREFIX: &str = "SCH";
pub const SCHOOL_CODE_RANDOM_LEN: usize = 6;
pub const STUDENT_CODE_LEN: usize = 8;
pub const INVITATION_TOKEN_LEN: usize = 48;

pub const SCHOOL_CODE_TTL_HOURS: i64 = 24;
pub const GENERATION_WINDOW_HOURS: i64 = 24;
pub const MAX_GENERATIONS_PER_WINDOW: i64 = 5;
pub const MAX_UNIQUENESS_ATTEMPTS: usize = 5;

pub fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// `SCH` followed by six alphabet characters.
pub fn school_code() -> String {
    format!("{SCHOOL_CODE_PREFIX}{}", random_code(SCHOOL_CODE_RANDOM_LEN))
}

pub fn student_code() -> String {
    random_code(STUDENT_CODE_LEN)
}

pub fn invitation_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITATION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Draws codes until one is free, giving up after a fixed number of attempts.
pub async fn draw_unique_code(store: &dyn Store, draw: fn() -> String) -> AppResult<String> {
    for _ in 0..MAX_UNIQUENESS_ATTEMPTS {
        let candidate = draw();
        if !store.code_taken(&candidate).await? {
            return Ok(candidate);
        }
    }
    Err(AppError::GenerationExhausted)
}

pub struct SchoolCodeService;

impl SchoolCodeService {
    /// Replaces the school's join code with a fresh one valid for 24 hours.
    pub async fn generate(
        store: &dyn Store,
        clock: &Clock,
        caller: &Caller,
        school_id: Uuid,
    ) -> AppResult<SchoolCodeResponse> {
        if !caller.can_supervise(school_id) {
            return Err(AppError::forbidden("Only administrators and supervisors can generate school codes"));
        }
        store
            .get_school(school_id)
            .await?
            .ok_or_else(|| AppError::not_found("School not found"))?;

        let now = clock.now();
        let window_start = now - Duration::hours(GENERATION_WINDOW_HOURS);
        // Early exit only; the store re-counts under the school row lock.
        let recent = store.count_code_generations(school_id, window_start).await?;
        if recent >= MAX_GENERATIONS_PER_WINDOW {
            return Err(Self::rate_limited(school_id, recent));
        }

        let expires_at = now + Duration::hours(SCHOOL_CODE_TTL_HOURS);
        for _ in 0..MAX_UNIQUENESS_ATTEMPTS {
            let code = school_code();
            if store.code_taken(&code).await? {
                continue;
            }
            let outcome = store
                .store_school_code(SchoolCodeUpdate {
                    school_id,
                    code: code.clone(),
                    expires_at,
                    generated_by: caller.user_id,
                    generated_at: now,
                    window_start,
                    max_per_window: MAX_GENERATIONS_PER_WINDOW,
                })
                .await?;
            match outcome {
                CodeUpdateOutcome::Stored => {
                    SCHOOL_CODES_GENERATED.with_label_values(&["regenerate"]).inc();
                    tracing::info!(%school_id, "school code regenerated");
                    return Ok(SchoolCodeResponse { code, expires_at });
                }
                CodeUpdateOutcome::RateLimited { recent } => return Err(Self::rate_limited(school_id, recent)),
                CodeUpdateOutcome::Taken => continue,
            }
        }

        Err(AppError::GenerationExhausted)
    }

    fn rate_limited(school_id: Uuid, recent: i64) -> AppError {
        RATE_LIMIT_REJECTIONS.with_label_values(&["school_code"]).inc();
        tracing::info!(%school_id, recent, "school code generation rate limited");
        AppError::RateLimited
    }
}
