//! Email service for sending magic-link login emails.

use lettre::{
    AsyncFileTransport, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use std::path::Path;

use crate::{
    auth::magic_link,
    config::{EmailConfig, EmailTransportConfig},
    errors::Error,
};

pub struct EmailService {
    transport: EmailTransport,
    from_email: String,
    from_name: String,
}

enum EmailTransport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    File(AsyncFileTransport<Tokio1Executor>),
}

impl EmailService {
    pub fn new(email_config: &EmailConfig) -> Result<Self, Error> {
        let transport = match &email_config.transport {
            EmailTransportConfig::Smtp {
                host,
                port,
                username,
                password,
                use_tls,
            } => {
                if !use_tls {
                    tracing::warn!("SMTP TLS is disabled - this is not recommended for production");
                }

                let smtp_builder = if *use_tls {
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                } else {
                    Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host))
                }
                .map_err(|e| Error::Internal {
                    operation: format!("create SMTP transport: {e}"),
                })?
                .port(*port)
                .credentials(Credentials::new(username.clone(), password.clone()));

                EmailTransport::Smtp(smtp_builder.build())
            }
            EmailTransportConfig::File { path } => {
                // File transport for development/testing
                let emails_dir = Path::new(path);
                if !emails_dir.exists() {
                    std::fs::create_dir_all(emails_dir).map_err(|e| Error::Internal {
                        operation: format!("create emails directory: {e}"),
                    })?;
                }
                EmailTransport::File(AsyncFileTransport::<Tokio1Executor>::new(emails_dir))
            }
        };

        Ok(Self {
            transport,
            from_email: email_config.from_email.clone(),
            from_name: email_config.from_name.clone(),
        })
    }

    /// Sends a login email carrying the one-time magic link for `to_email`.
    pub async fn send_magic_link_email(&self, to_email: &str, base_url: &str, token: &str) -> Result<(), Error> {
        let login_link = magic_link::magic_link_url(base_url, token);

        let subject = "Your login link";
        let body = self.create_magic_link_body(&login_link);

        self.send_email(to_email, subject, &body).await
    }

    async fn send_email(&self, to_email: &str, subject: &str, body: &str) -> Result<(), Error> {
        let from = format!("{} <{}>", self.from_name, self.from_email)
            .parse::<Mailbox>()
            .map_err(|e| Error::Internal {
                operation: format!("parse from email: {e}"),
            })?;

        let to = to_email.parse::<Mailbox>().map_err(|e| Error::Internal {
            operation: format!("parse to email: {e}"),
        })?;

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body.to_string())
            .map_err(|e| Error::Internal {
                operation: format!("build email message: {e}"),
            })?;

        match &self.transport {
            EmailTransport::Smtp(smtp) => {
                smtp.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send SMTP email: {e}"),
                })?;
            }
            EmailTransport::File(file) => {
                file.send(message).await.map_err(|e| Error::Internal {
                    operation: format!("send file email: {e}"),
                })?;
            }
        }

        Ok(())
    }

    fn create_magic_link_body(&self, login_link: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Your login link</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
        .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
        .footer {{ margin-top: 30px; font-size: 12px; color: #666; }}
    </style>
</head>
<body>
    <div class="container">
        <h2>Log in to {from_name}</h2>

        <p>Hello,</p>

        <p>Click the link below to log in. If you didn't request this email, you can safely ignore it.</p>

        <p><a href="{login_link}">Log in</a></p>

        <p>Or copy and paste this link into your browser:</p>
        <p>{login_link}</p>

        <p>This link can be used once and expires in 15 minutes.</p>

        <div class="footer">
            <p>This is an automated message, please do not reply to this email.</p>
        </div>
    </div>
</body>
</html>"#,
            from_name = self.from_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn file_config(dir: &TempDir) -> EmailConfig {
        EmailConfig {
            from_email: "noreply@example.com".to_string(),
            from_name: "Larder".to_string(),
            transport: EmailTransportConfig::File {
                path: dir.path().to_string_lossy().to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_email_service_creation() {
        let dir = TempDir::new().unwrap();
        assert!(EmailService::new(&file_config(&dir)).is_ok());
    }

    #[tokio::test]
    async fn test_magic_link_body_contains_link_and_expiry() {
        let dir = TempDir::new().unwrap();
        let service = EmailService::new(&file_config(&dir)).unwrap();

        let body = service.create_magic_link_body("https://example.com/api/auth/verify?token=abc123");

        assert!(body.contains("https://example.com/api/auth/verify?token=abc123"));
        assert!(body.contains("expires in 15 minutes"));
        assert!(body.contains("Log in"));
    }

    #[tokio::test]
    async fn test_file_transport_writes_message() {
        let dir = TempDir::new().unwrap();
        let service = EmailService::new(&file_config(&dir)).unwrap();

        service
            .send_magic_link_email("a@example.com", "https://example.com", "tok123")
            .await
            .unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(written.len(), 1);
        let contents = std::fs::read_to_string(written[0].as_ref().unwrap().path()).unwrap();
        assert!(contents.contains("a@example.com"));
        assert!(contents.contains("token=3Dtok123") || contents.contains("token=tok123"));
    }
}
