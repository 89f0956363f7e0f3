//! OTP email delivery.
//!
//! Signup and resend flows hand an [`OtpMail`] to a [`Mailer`], which decides
//! how to deliver it. Delivery is best-effort and synchronous with the
//! request: there is no retry, no queue, and no transaction with the user
//! write that preceded it. The default for local dev is [`LogMailer`], which
//! logs the payload and returns `Ok`.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::info;

/// A rendered one-time-code email.
#[derive(Debug, Clone)]
pub struct OtpMail {
    pub to_email: String,
    pub username: String,
    pub otp: String,
    pub ttl: Duration,
}

impl OtpMail {
    pub fn subject(&self) -> &'static str {
        "Your OTP Code"
    }

    pub fn body(&self) -> String {
        let minutes = (self.ttl.as_secs() / 60).max(1);
        format!(
            "Hello {},\n\nYour OTP code is: {}\nIt will expire in {} minutes.\n\nThank you!",
            self.username, self.otp, minutes
        )
    }
}

/// Delivery backends. An enum rather than a trait object because the send
/// path awaits the HTTP mail provider.
#[derive(Debug, Clone)]
pub enum Mailer {
    HttpApi(HttpApiMailer),
    Log(LogMailer),
    Recording(RecordingMailer),
}

impl Mailer {
    pub async fn send_otp(&self, mail: &OtpMail) -> Result<()> {
        match self {
            Self::HttpApi(m) => m.send_otp(mail).await,
            Self::Log(m) => m.send_otp(mail),
            Self::Recording(m) => m.send_otp(mail),
        }
    }
}

/// Sends through an HTTP mail provider (JSON POST with a bearer token).
#[derive(Debug, Clone)]
pub struct HttpApiMailer {
    client: reqwest::Client,
    endpoint: String,
    api_token: String,
    from: String,
}

impl HttpApiMailer {
    pub fn new(endpoint: String, api_token: String, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_token,
            from,
        }
    }

    async fn send_otp(&self, mail: &OtpMail) -> Result<()> {
        let payload = serde_json::json!({
            "from": self.from,
            "to": mail.to_email,
            "subject": mail.subject(),
            "text": mail.body(),
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_token)
            .json(&payload)
            .send()
            .await
            .context("mail provider unreachable")?;

        let status = response.status();
        if !status.is_success() {
            bail!("mail provider returned {}", status);
        }

        info!(to = %mail.to_email, "OTP email sent");
        Ok(())
    }
}

/// Local dev mailer that logs the code instead of sending real email.
#[derive(Debug, Clone)]
pub struct LogMailer;

impl LogMailer {
    fn send_otp(&self, mail: &OtpMail) -> Result<()> {
        info!(
            to = %mail.to_email,
            subject = mail.subject(),
            otp = %mail.otp,
            "mail send stub"
        );
        Ok(())
    }
}

/// Test mailer that captures every mail it is asked to send.
#[derive(Debug, Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OtpMail>>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    fn send_otp(&self, mail: &OtpMail) -> Result<()> {
        self.sent.lock().expect("recording mailer poisoned").push(mail.clone());
        Ok(())
    }

    /// The OTP from the most recently captured mail, if any.
    pub fn last_otp(&self) -> Option<String> {
        self.sent
            .lock()
            .expect("recording mailer poisoned")
            .last()
            .map(|m| m.otp.clone())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().expect("recording mailer poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OtpMail {
        OtpMail {
            to_email: "a@x.com".into(),
            username: "alice".into(),
            otp: "123456".into(),
            ttl: Duration::from_secs(300),
        }
    }

    #[test]
    fn body_contains_code_and_ttl_minutes() {
        let body = mail().body();
        assert!(body.contains("Hello alice"));
        assert!(body.contains("123456"));
        assert!(body.contains("5 minutes"));
    }

    #[test]
    fn sub_minute_ttl_rounds_up_to_one() {
        let mut m = mail();
        m.ttl = Duration::from_secs(30);
        assert!(m.body().contains("1 minutes"));
    }

    #[tokio::test]
    async fn recording_mailer_captures_latest_otp() {
        let recorder = RecordingMailer::new();
        let mailer = Mailer::Recording(recorder.clone());

        mailer.send_otp(&mail()).await.unwrap();
        let mut second = mail();
        second.otp = "654321".into();
        mailer.send_otp(&second).await.unwrap();

        assert_eq!(recorder.sent_count(), 2);
        assert_eq!(recorder.last_otp().as_deref(), Some("654321"));
    }
}
