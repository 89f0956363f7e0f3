//! Client-side message encryption (AES-256-GCM).
//!
//! Message bodies are encrypted before they leave the client; the server
//! stores and returns ciphertext opaquely and never links this crate.
//!
//! Conversations currently share one symmetric key distributed with the
//! client. That key provides no real confidentiality against anyone holding
//! a client build — replacing it with per-conversation keys negotiated over
//! an authenticated exchange is an open issue.

pub mod encrypt;
pub mod keys;
