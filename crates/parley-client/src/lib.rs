//! Client session layer.
//!
//! A [`Session`] talks to the Parley server over HTTP: it signs up, verifies
//! the OTP, signs in and then holds the bearer token for authenticated
//! calls. Message bodies are encrypted with AES-256-GCM before they are
//! sent and decrypted after they are fetched — the server only ever sees
//! ciphertext.

use anyhow::{Context, Result, anyhow, bail};
use uuid::Uuid;

use parley_crypto::encrypt::{decrypt_from_base64, encrypt_to_base64};
use parley_crypto::keys::key_from_base64;
use parley_types::api::{
    MessageResponse, SendMessageRequest, SigninRequest, SigninResponse, SignupRequest,
    SignupResponse, UserResponse, VerifyOtpRequest, VerifyOtpResponse,
};
use parley_types::models::ChatMessage;

/// Conversation key baked into the client build. Anyone holding a client
/// binary holds this key, so it provides no confidentiality against other
/// users — an open issue, kept for compatibility with the deployed clients.
const SHARED_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";

/// Identity returned by signin and kept for the life of the session.
#[derive(Debug, Clone)]
pub struct Identity {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

pub struct Session {
    http: reqwest::Client,
    base_url: String,
    key: [u8; 32],
    identity: Option<Identity>,
}

impl Session {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_key(base_url, SHARED_KEY)
    }

    pub fn with_key(base_url: impl Into<String>, key: [u8; 32]) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            key,
            identity: None,
        }
    }

    /// Use a conversation key shared out-of-band as base64.
    pub fn with_shared_key_base64(base_url: impl Into<String>, encoded: &str) -> Result<Self> {
        Ok(Self::with_key(base_url, key_from_base64(encoded)?))
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    // -- Auth flow --

    pub async fn signup(&self, username: &str, email: &str, password: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/signup"))
            .json(&SignupRequest {
                username: username.into(),
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await
            .context("signup request failed")?;

        let body: SignupResponse = check(response).await?.json().await?;
        Ok(body.message)
    }

    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<String> {
        let response = self
            .http
            .post(self.url("/verify-otp"))
            .json(&VerifyOtpRequest {
                email: email.into(),
                otp: otp.into(),
            })
            .send()
            .await
            .context("verify-otp request failed")?;

        let body: VerifyOtpResponse = check(response).await?.json().await?;
        Ok(body.message)
    }

    /// Sign in and keep the bearer token for subsequent calls.
    pub async fn signin(&mut self, email: &str, password: &str) -> Result<Identity> {
        let response = self
            .http
            .post(self.url("/signin"))
            .json(&SigninRequest {
                email: email.into(),
                password: password.into(),
            })
            .send()
            .await
            .context("signin request failed")?;

        let body: SigninResponse = check(response).await?.json().await?;
        let identity = Identity {
            token: body.token,
            user_id: body.user_id,
            username: body.username,
            email: body.email,
        };
        self.identity = Some(identity.clone());
        Ok(identity)
    }

    // -- Authenticated calls --

    pub async fn profile(&self) -> Result<UserResponse> {
        let response = self
            .http
            .get(self.url("/profile"))
            .bearer_auth(self.token()?)
            .send()
            .await
            .context("profile request failed")?;

        Ok(check(response).await?.json().await?)
    }

    pub async fn users(&self) -> Result<Vec<UserResponse>> {
        let response = self
            .http
            .get(self.url("/users"))
            .bearer_auth(self.token()?)
            .send()
            .await
            .context("users request failed")?;

        Ok(check(response).await?.json().await?)
    }

    /// Encrypt a message body and send it to the given user.
    pub async fn send_message(&self, receiver_id: Uuid, body: &str) -> Result<ChatMessage> {
        let (ciphertext, nonce) = encrypt_to_base64(&self.key, body)?;

        let response = self
            .http
            .post(self.url("/messages"))
            .bearer_auth(self.token()?)
            .json(&SendMessageRequest {
                receiver_id,
                ciphertext,
                nonce,
            })
            .send()
            .await
            .context("send message request failed")?;

        let message: MessageResponse = check(response).await?.json().await?;
        self.decrypt(message)
    }

    /// Fetch a page of the conversation with the given user, oldest first,
    /// decrypting each message body.
    pub async fn conversation(
        &self,
        other_user_id: Uuid,
        limit: Option<u32>,
        before: Option<&str>,
    ) -> Result<Vec<ChatMessage>> {
        let mut request = self
            .http
            .get(self.url(&format!("/messages/{}", other_user_id)))
            .bearer_auth(self.token()?);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        if let Some(before) = before {
            request = request.query(&[("before", before)]);
        }

        let response = request.send().await.context("conversation request failed")?;

        let messages: Vec<MessageResponse> = check(response).await?.json().await?;
        messages.into_iter().map(|m| self.decrypt(m)).collect()
    }

    fn decrypt(&self, message: MessageResponse) -> Result<ChatMessage> {
        let body = decrypt_from_base64(&self.key, &message.ciphertext, &message.nonce)
            .with_context(|| format!("cannot decrypt message {}", message.id))?;
        Ok(ChatMessage {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            body,
            created_at: message.created_at,
        })
    }

    fn token(&self) -> Result<&str> {
        self.identity
            .as_ref()
            .map(|i| i.token.as_str())
            .ok_or_else(|| anyhow!("not signed in"))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Turn a structured error body into an error, passing success through.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: serde_json::Value = response.json().await.unwrap_or_default();
    let kind = body["kind"].as_str().unwrap_or("UNKNOWN");
    let message = body["message"].as_str().unwrap_or("no error body");
    bail!("{} {}: {}", status.as_u16(), kind, message)
}
