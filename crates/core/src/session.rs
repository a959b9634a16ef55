mod approval;
mod builder;
mod mailbox;
mod snapshot;
mod state;
#[cfg(test)]
mod tests;

use std::sync::Arc;

use folio_api::ConversationId;
use tokio::sync::watch;
use tracing::Instrument;

pub use approval::{DELETE_PROMPT, DeleteApproval};
pub use builder::SessionBuilder;
use mailbox::{Command, Mailbox, MailboxParts};
pub use snapshot::{
    CONVERSATION_GONE, HISTORY_FAILED, Notice, NoticeKind, SessionSnapshot,
};
pub use state::NO_CODE_GENERATED;
use state::{DeleteRequestFn, SessionState, run_session};

use crate::backend_client::BackendClient;
use crate::identity::Identity;

/// Handle to the conversational code-generation session.
///
/// The session runs as a loop that processes commands one at a time. Every
/// method here only enqueues a command and returns immediately; the outcome
/// is observed through the snapshots published by the loop, see
/// [`subscribe`](Self::subscribe).
///
/// The loop keeps running as long as a handle or one of its requests is
/// alive, or until [`shutdown`](Self::shutdown) is called.
#[derive(Clone)]
pub struct SessionController {
    mailbox: Arc<Mailbox>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl SessionController {
    fn spawn(
        backend: BackendClient,
        identity: Identity,
        on_delete_request: Option<DeleteRequestFn>,
    ) -> Self {
        let MailboxParts {
            mailbox,
            cmd_rx,
            kill_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
        let state =
            SessionState::new(backend, identity, on_delete_request, snapshot_tx);
        tokio::spawn(
            run_session(Arc::downgrade(&mailbox), state, cmd_rx, kill_rx)
                .instrument(debug_span!("session")),
        );
        Self {
            mailbox,
            snapshot_rx,
        }
    }

    /// Sends a code-generation prompt in the active conversation, or in a
    /// new one if none is active.
    ///
    /// Blank prompts are ignored, and so are prompts sent while another
    /// request is in flight.
    #[inline]
    pub fn send_prompt<S: Into<String>>(&self, text: S) {
        self.mailbox.post(Command::SendPrompt(text.into()));
    }

    /// Asks the backend for a new, empty conversation and makes it active.
    #[inline]
    pub fn start_new_conversation(&self) {
        self.mailbox.post(Command::StartNewConversation);
    }

    /// Makes a conversation active and loads its history.
    #[inline]
    pub fn select_conversation(&self, id: ConversationId) {
        self.mailbox.post(Command::SelectConversation(id));
    }

    /// Forgets the active conversation locally. Nothing is deleted.
    #[inline]
    pub fn clear_conversation(&self) {
        self.mailbox.post(Command::ClearConversation);
    }

    /// Deletes a conversation once the user confirms it.
    #[inline]
    pub fn delete_conversation(&self, id: ConversationId) {
        self.mailbox.post(Command::DeleteConversation(id));
    }

    /// Refetches the conversation list.
    #[inline]
    pub fn refresh_conversations(&self) {
        self.mailbox.post(Command::RefreshConversations);
    }

    /// Refetches the history of the active conversation.
    #[inline]
    pub fn reload_history(&self) {
        self.mailbox.post(Command::ReloadHistory);
    }

    /// Tells the session that the user signed in or out.
    #[inline]
    pub fn credential_changed(&self) {
        self.mailbox.post(Command::CredentialChanged);
    }

    /// Returns a receiver of the published snapshots.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Returns the latest published snapshot.
    #[inline]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Waits until every command issued so far has been processed and
    /// nothing is in flight anymore.
    ///
    /// Returns `None` if the session stopped before that.
    pub async fn settled(&self) -> Option<SessionSnapshot> {
        let target = self.mailbox.issued();
        let mut snapshot_rx = self.snapshot_rx.clone();
        snapshot_rx
            .wait_for(|s| {
                s.revision > 0 && s.handled_commands >= target && s.is_idle()
            })
            .await
            .ok()
            .map(|s| s.clone())
    }

    /// Stops the loop and aborts its in-flight requests.
    #[inline]
    pub fn shutdown(&self) {
        self.mailbox.try_kill();
    }
}
