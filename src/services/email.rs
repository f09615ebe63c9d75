use anyhow::Context;
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use uuid::Uuid;

use crate::config::Config;
use crate::models::invitation::InvitationKind;

pub struct EmailService {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl EmailService {
    /// Returns None if SMTP is not fully configured.
    pub fn new(config: &Config) -> Option<Self> {
        let host = config.smtp_host.as_deref()?;
        let username = config.smtp_username.clone()?;
        let password = config.smtp_password.clone()?;
        let from_addr = config.smtp_from.as_deref()?;

        let port = config.smtp_port.unwrap_or(587);
        let creds = Credentials::new(username, password);

        let transport = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
                .ok()?
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .ok()?
                .port(port)
                .credentials(creds)
                .build()
        };

        let from: Mailbox = from_addr.parse().ok()?;

        Some(Self { transport, from })
    }

    fn new_message_id(&self) -> String {
        format!("<{}@{}>", Uuid::new_v4(), self.from.email.domain())
    }

    async fn send_email(&self, to: Mailbox, subject: &str, text: &str, html: &str) -> anyhow::Result<()> {
        let email = Message::builder()
            .message_id(Some(self.new_message_id()))
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html.to_string()),
                    ),
            )
            .context("Failed to build email message")?;

        self.transport
            .send(email)
            .await
            .context("Failed to send email")?;

        Ok(())
    }

    pub async fn send_invitation(
        &self,
        to_email: &str,
        invite_url: &str,
        school_name: &str,
        kind: InvitationKind,
    ) -> anyhow::Result<()> {
        let to: Mailbox = to_email.parse()?;
        let (subject, text, html) = invitation_body(invite_url, school_name, kind);
        self.send_email(to, &subject, &text, &html).await
    }
}

fn invitation_body(invite_url: &str, school_name: &str, kind: InvitationKind) -> (String, String, String) {
    let role = match kind {
        InvitationKind::Teacher => "a teacher",
        InvitationKind::Student => "a student",
    };
    let subject = format!("You're invited to join {school_name} on LearnAble");
    let text = format!(
        "You have been invited to join {school_name} as {role}.\n\n\
        Open this link to accept the invitation:\n\
        {invite_url}\n\n\
        The link expires in 7 days."
    );
    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<body style="margin:0;padding:32px;background-color:#f1f5f9;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Helvetica,Arial,sans-serif">
  <div style="max-width:520px;margin:0 auto;background:#ffffff;border-radius:12px;padding:40px">
    <h1 style="margin:0 0 8px 0;font-size:22px;color:#0f172a">You're invited!</h1>
    <p style="margin:0 0 28px 0;font-size:15px;color:#64748b;line-height:1.6">Join <strong>{school_name}</strong> as {role}.</p>
    <a href="{invite_url}" style="display:inline-block;padding:13px 28px;background:#2563eb;color:#ffffff;text-decoration:none;font-weight:600;border-radius:8px">Accept invitation</a>
    <p style="margin:28px 0 0 0;font-size:13px;color:#94a3b8">The link expires in <strong>7 days</strong>.</p>
  </div>
</body>
</html>"#
    );
    (subject, text, html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_smtp_yields_none() {
        let config = Config::for_memory("secret");
        assert!(EmailService::new(&config).is_none());
    }

    #[test]
    fn test_invitation_body_mentions_school_and_link() {
        let (subject, text, html) =
            invitation_body("http://localhost:3000/invite?token=abc", "Lincoln High", InvitationKind::Teacher);
        assert!(subject.contains("Lincoln High"));
        assert!(text.contains("as a teacher"));
        assert!(text.contains("http://localhost:3000/invite?token=abc"));
        assert!(html.contains("href=\"http://localhost:3000/invite?token=abc\""));
    }
}
