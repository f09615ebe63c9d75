use crate::error::{AppError, AppResult};

/// Names, titles and emails share the `VARCHAR(255)` columns.
pub const MAX_NAME_LEN: usize = 255;
pub const MAX_ACTIVITY_LEN: usize = 64;

/// Trims `value` and rejects it when empty or longer than `max` characters.
pub fn required_text(field: &str, value: &str, max: usize) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::bad_request(format!("{field} is required")));
    }
    if value.chars().count() > max {
        return Err(AppError::bad_request(format!("{field} must be at most {max} characters")));
    }
    Ok(value.to_string())
}

/// Name used for a profile created before the user picked one.
pub fn name_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default().trim();
    let name: String = local.chars().take(MAX_NAME_LEN).collect();
    if name.is_empty() { "User".to_string() } else { name }
}
