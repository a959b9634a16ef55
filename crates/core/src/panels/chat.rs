use std::sync::Mutex;

use folio_api::{ChatRequest, Message};

use super::{Submission, lock};
use crate::backend_client::BackendClient;
use crate::guard::BusyGuard;

/// The reply shown when the backend answered without any text.
pub const NO_CLEAR_RESPONSE: &str =
    "Sorry, I couldn't get a clear response from the AI via the backend.";

/// The anonymous general-purpose chat.
pub struct ChatPanel {
    backend: BackendClient,
    guard: BusyGuard,
    messages: Mutex<Vec<Message>>,
}

impl ChatPanel {
    /// Creates an empty chat.
    #[inline]
    pub fn new(backend: BackendClient) -> Self {
        Self {
            backend,
            guard: BusyGuard::default(),
            messages: Mutex::new(vec![]),
        }
    }

    /// Sends a message and returns the assistant reply.
    ///
    /// Failures don't surface as errors: they become the reply, as the user
    /// would see them.
    pub async fn submit(&self, text: &str) -> Submission<Message> {
        let text = text.trim();
        if text.is_empty() {
            return Submission::Ignored;
        }
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("chat is busy, ignoring input");
            return Submission::Ignored;
        };

        lock(&self.messages).push(Message::user(text));
        let request = ChatRequest {
            message: text.to_owned(),
        };
        let reply = match self.backend.chat(request).await {
            Ok(Some(reply)) if !reply.is_empty() => reply,
            Ok(_) => {
                warn!("chat reply has no text");
                NO_CLEAR_RESPONSE.to_owned()
            }
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
