use std::fmt::{self, Display};

use folio_api::{ConversationId, Message};

use crate::conversation_list::ConversationList;

/// The message shown when the active conversation vanished from the
/// backend.
pub const CONVERSATION_GONE: &str = "This conversation no longer exists.";

/// The message shown when the history of a conversation cannot be loaded.
pub const HISTORY_FAILED: &str = "Failed to load conversation history.";

/// The category of a [`Notice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoticeKind {
    /// There is no valid credential.
    SignInRequired,
    /// The active conversation no longer exists.
    ConversationGone,
    /// Loading the history failed for another reason.
    HistoryFailed,
    /// A prompt or a conversation creation failed.
    RequestFailed,
}

/// A user-facing error notice of the code-generation session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    /// What went wrong.
    pub kind: NoticeKind,
    /// The text to show.
    pub message: String,
}

impl Notice {
    pub(crate) fn new<S: Into<String>>(kind: NoticeKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// An immutable view of the session, published after every command the
/// controller processes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Increases every time a new snapshot is published.
    pub revision: u64,
    /// How many user commands the controller has processed so far.
    pub handled_commands: u64,
    /// The conversation prompts are sent to, if any.
    pub active_id: Option<ConversationId>,
    /// The messages of the active conversation, oldest first.
    pub transcript: Vec<Message>,
    /// Whether a prompt or a conversation creation is in flight.
    pub busy: bool,
    /// Whether the history of the active conversation is being loaded.
    pub history_loading: bool,
    /// The last error notice, cleared by the next successful operation.
    pub notice: Option<Notice>,
    /// The cached conversation list.
    pub conversations: ConversationList,
    /// Deletions waiting for a decision or for the backend.
    pub pending_deletes: usize,
    /// Whether a valid credential was present when the snapshot was taken.
    pub signed_in: bool,
}

impl SessionSnapshot {
    /// Returns whether nothing is in flight.
    #[inline]
    pub fn is_idle(&self) -> bool {
        !self.busy
            && !self.history_loading
            && !self.conversations.is_loading()
            && self.pending_deletes == 0
    }
}
