//! Response generation
//!
//! The loop treats response generation as a black box mapping one
//! [`Utterance`] to one [`Response`]. The default [`EchoResponder`] repeats
//! the utterance behind a fixed prefix.

use std::fmt;

use async_trait::async_trait;

use crate::config::DEFAULT_RESPONSE_PREFIX;

/// Transcript produced by one recognition session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance(String);

impl Utterance {
    /// Wrap a transcript
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Transcript text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text to be spoken back for one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response(String);

impl Response {
    /// Wrap response text
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Response text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Maps an utterance to the response that will be spoken
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce the response for `utterance`
    async fn respond(&self, utterance: &Utterance) -> Response;
}

/// Echoes the utterance behind a fixed prefix
#[derive(Debug, Clone)]
pub struct EchoResponder {
    prefix: String,
}

impl EchoResponder {
    /// Create an echo responder with a custom prefix
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for EchoResponder {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_PREFIX)
    }
}

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(&self, utterance: &Utterance) -> Response {
        Response::new(format!("{}{}", self.prefix, utterance.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_default_prefix() {
        let response = EchoResponder::default()
            .respond(&Utterance::new("hello"))
            .await;
        assert_eq!(response.as_str(), "You said: hello");
    }

    #[tokio::test]
    async fn test_echo_custom_prefix() {
        let response = EchoResponder::new("> ").respond(&Utterance::new("hi")).await;
        assert_eq!(response, Response::new("> hi"));
    }
}
