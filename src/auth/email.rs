// Outbound email for OTP delivery

use std::time::Duration;

use axum::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Why a code was sent; selects the message template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtpPurpose {
    VerifyAccount,
    ResetPassword,
}

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::VerifyAccount => "verify_account",
            OtpPurpose::ResetPassword => "reset_password",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            OtpPurpose::VerifyAccount => "Your account verification code",
            OtpPurpose::ResetPassword => "Your password reset code",
        }
    }

    pub fn body(&self, code: &str) -> String {
        match self {
            OtpPurpose::VerifyAccount => format!(
                "Your code to verify your account is: {}. The code is valid for 5 minutes.",
                code
            ),
            OtpPurpose::ResetPassword => format!(
                "Your code to reset your password is: {}. The code is valid for 5 minutes.",
                code
            ),
        }
    }
}

impl std::fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl EmailMessage {
    pub fn otp(to: &str, code: &str, purpose: OtpPurpose) -> Self {
        Self {
            to: to.to_string(),
            subject: purpose.subject().to_string(),
            body: purpose.body(code),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("invalid address {0}")]
    Address(String),
    #[error("failed to build message: {0}")]
    Build(String),
    #[error("smtp transport error: {0}")]
    Transport(String),
    #[error("smtp delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// Delivers a message; failure is reported synchronously to the caller
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// SMTP settings (STARTTLS + login)
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub timeout: Duration,
}

/// Authenticated SMTP relay
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    timeout: Duration,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::Address(config.from.clone()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(config.timeout))
            .build();

        Ok(Self {
            transport,
            from,
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        let to: Mailbox = message
            .to
            .parse()
            .map_err(|_| MailError::Address(message.to.clone()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| MailError::Build(e.to_string()))?;

        // The transport has its own socket timeout; this bounds the whole exchange
        match tokio::time::timeout(self.timeout, self.transport.send(email)).await {
            Ok(Ok(_)) => {
                debug!(to = %message.to, "email delivered");
                Ok(())
            }
            Ok(Err(e)) => Err(MailError::Transport(e.to_string())),
            Err(_) => Err(MailError::Timeout(self.timeout)),
        }
    }
}

/// Development mailer: records the delivery in the log without the body
#[derive(Debug, Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "smtp not configured, email not sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates_differ_by_purpose() {
        let verify = EmailMessage::otp("a@x.com", "123456", OtpPurpose::VerifyAccount);
        let reset = EmailMessage::otp("a@x.com", "123456", OtpPurpose::ResetPassword);
        assert_ne!(verify.subject, reset.subject);
        assert!(verify.body.contains("123456"));
        assert!(reset.body.contains("reset"));
        assert!(verify.body.contains("5 minutes"));
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_sender() {
        let config = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "user".into(),
            password: "pass".into(),
            from: "not an address".into(),
            timeout: Duration::from_secs(5),
        };
        assert!(matches!(SmtpMailer::new(&config), Err(MailError::Address(_))));
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let message = EmailMessage::otp("a@x.com", "123456", OtpPurpose::VerifyAccount);
        assert!(LogMailer.send(&message).await.is_ok());
    }
}
