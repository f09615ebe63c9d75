use std::sync::Arc;

use crate::models::invitation::InvitationKind;
use crate::services::email::EmailService;

/// Delivers invitation links. Mails them when SMTP is configured and logs
/// them otherwise; delivery never fails the request that issued them.
#[derive(Clone)]
pub struct NotificationService {
    pub email: Option<Arc<EmailService>>,
    pub app_base_url: String,
}

impl NotificationService {
    pub fn new(email: Option<Arc<EmailService>>, app_base_url: impl Into<String>) -> Self {
        Self {
            email,
            app_base_url: app_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn invite_url(&self, token: &str) -> String {
        format!("{}/invite?token={}", self.app_base_url, token)
    }

    pub fn send_invitation(&self, to_email: &str, invite_url: &str, school_name: &str, kind: InvitationKind) {
        let Some(email) = self.email.clone() else {
            tracing::info!(to = %to_email, %kind, %invite_url, "SMTP not configured, invitation link not mailed");
            return;
        };

        let to = to_email.to_string();
        let url = invite_url.to_string();
        let school = school_name.to_string();
        tokio::spawn(async move {
            if let Err(e) = email.send_invitation(&to, &url, &school, kind).await {
                tracing::warn!("Failed to send invitation email to {to}: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invite_url_strips_trailing_slash() {
        let notifier = NotificationService::new(None, "https://learnable.app/");
        assert_eq!(notifier.invite_url("abc"), "https://learnable.app/invite?token=abc");
    }
}
