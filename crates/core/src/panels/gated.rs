use std::sync::Mutex;

use folio_api::{GatedChatRequest, Message};

use super::{Submission, lock};
use crate::backend_client::BackendClient;
use crate::guard::BusyGuard;
use crate::identity::Identity;

/// The reason given when no CAPTCHA token is available.
pub const CAPTCHA_REQUIRED: &str = "Please complete the reCAPTCHA challenge.";

/// The reply shown when the gated model answered without any text.
pub const NO_RESPONSE: &str = "No response received.";

/// The chat with the custom AI model, which needs both a credential and a
/// solved CAPTCHA.
///
/// A CAPTCHA token is good for a single request. It is consumed by every
/// request that is sent, successful or not, and the host has to provide a
/// new one before the next submission.
pub struct GatedChatPanel {
    backend: BackendClient,
    identity: Identity,
    guard: BusyGuard,
    captcha_token: Mutex<Option<String>>,
    messages: Mutex<Vec<Message>>,
}

impl GatedChatPanel {
    /// Creates an empty chat.
    #[inline]
    pub fn new(backend: BackendClient, identity: Identity) -> Self {
        Self {
            backend,
            identity,
            guard: BusyGuard::default(),
            captcha_token: Mutex::new(None),
            messages: Mutex::new(vec![]),
        }
    }

    /// Provides the token of a solved CAPTCHA.
    pub fn set_captcha_token<S: Into<String>>(&self, token: S) {
        let token = token.into();
        *lock(&self.captcha_token) = Some(token).filter(|t| !t.is_empty());
    }

    /// Drops the CAPTCHA token, e.g. because the challenge expired.
    #[inline]
    pub fn clear_captcha_token(&self) {
        lock(&self.captcha_token).take();
    }

    /// Returns whether a CAPTCHA token is available.
    #[inline]
    pub fn has_captcha_token(&self) -> bool {
        lock(&self.captcha_token).is_some()
    }

    /// Sends a message and returns the assistant reply.
    pub async fn submit(&self, text: &str) -> Submission<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Submission::Ignored;
        }
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("gated chat is busy, ignoring input");
            return Submission::Ignored;
        };
        if !self.has_captcha_token() {
            return Submission::Blocked(CAPTCHA_REQUIRED.to_owned());
        }
        let credential = match self.identity.valid_credential() {
            Ok(credential) => credential,
            Err(err) => return Submission::Blocked(err.to_string()),
        };
        let Some(recaptcha_token) = lock(&self.captcha_token).take() else {
            return Submission::Blocked(CAPTCHA_REQUIRED.to_owned());
        };

        lock(&self.messages).push(Message::user(text));
        let request = GatedChatRequest {
            input: text.to_owned(),
            recaptcha_token,
        };
        let reply = match self.backend.gated_chat(request, credential).await {
            Ok(Some(reply)) if !reply.is_empty() => reply,
            Ok(_) => NO_RESPONSE.to_owned(),
            Err(err) => format!("Error: {err}. Please try again."),
        };
        let reply = Message::assistant(reply);
        lock(&self.messages).push(reply.clone());
        Submission::Completed(reply)
    }

    /// Returns the messages so far.
    #[inline]
    pub fn messages(&self) -> Vec<Message> {
        lock(&self.messages).clone()
    }

    /// Returns whether a message is being sent.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use folio_test_backend::{Failure, Operation, TestBackend, valid_credential};

    use super::*;
    use crate::identity::SIGN_IN_REQUIRED;
    use crate::store::MemoryStore;

    fn panel(backend: &TestBackend, signed_in: bool) -> GatedChatPanel {
        let identity = Identity::rehydrate(Arc::new(MemoryStore::new()));
        if signed_in {
            identity.sign_in(valid_credential()).unwrap();
        }
        GatedChatPanel::new(BackendClient::new(backend.clone()), identity)
    }

    #[tokio::test]
    async fn test_requires_captcha() {
        let backend = TestBackend::default();
        let panel = panel(&backend, true);
        assert_eq!(
            panel.submit("hello").await,
            Submission::Blocked(CAPTCHA_REQUIRED.to_owned())
        );
        panel.set_captcha_token("");
        assert!(!panel.has_captcha_token());
        assert!(backend.requests().is_empty());
        assert!(panel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_requires_sign_in() {
        let backend = TestBackend::default();
        let panel = panel(&backend, false);
        panel.set_captcha_token("solved");
        assert_eq!(
            panel.submit("hello").await,
            Submission::Blocked(SIGN_IN_REQUIRED.to_owned())
        );
        // Not consumed, since nothing was sent.
        assert!(panel.has_captcha_token());
    }

    #[tokio::test]
    async fn test_token_is_consumed() {
        let backend = TestBackend::default();
        let panel = panel(&backend, true);
        panel.set_captcha_token("solved");

        let reply = panel.submit("hello").await.completed().unwrap();
        assert_eq!(reply.text, "You said hello");
        assert!(!panel.has_captcha_token());
        assert!(matches!(panel.submit("again").await, Submission::Blocked(_)));

        // A failed request uses up the token too.
        backend.fail_next(
            Operation::GatedChat,
            Failure::status(400, "reCAPTCHA verification failed."),
        );
        panel.set_captcha_token("solved again");
        let reply = panel.submit("again").await.completed().unwrap();
        assert_eq!(
            reply.text,
            "Error: reCAPTCHA verification failed.. Please try again."
        );
        assert!(!panel.has_captcha_token());
        assert_eq!(panel.messages().len(), 4);
        assert_eq!(backend.request_count(Operation::GatedChat), 2);
    }
}
