use std::sync::atomic::{AtomicU64, Ordering};

use folio_api::{
    BackendError, CodegenReply, Conversation, ConversationId, Message,
};
use tokio::sync::{mpsc, watch};

type Outcome<T> = Result<T, Box<dyn BackendError>>;

/// Everything the controller loop reacts to.
///
/// The first group is issued by users of the controller, the second one is
/// posted back by the tasks the loop spawns.
#[derive(Debug)]
pub(super) enum Command {
    SendPrompt(String),
    StartNewConversation,
    SelectConversation(ConversationId),
    ClearConversation,
    DeleteConversation(ConversationId),
    RefreshConversations,
    ReloadHistory,
    CredentialChanged,

    PromptFinished {
        requested_id: Option<ConversationId>,
        result: Outcome<CodegenReply>,
    },
    ConversationCreated(Outcome<Conversation>),
    HistoryLoaded {
        id: ConversationId,
        result: Outcome<Vec<Message>>,
    },
    ConversationsListed {
        generation: u64,
        result: Outcome<Vec<Conversation>>,
    },
    DeleteDecided {
        id: ConversationId,
        approved: bool,
    },
    ConversationDeleted {
        id: ConversationId,
        result: Outcome<()>,
    },
    TaskEnded(u64),
}

impl Command {
    #[inline]
    pub(super) fn is_user_command(&self) -> bool {
        matches!(
            self,
            Command::SendPrompt(_)
                | Command::StartNewConversation
                | Command::SelectConversation(_)
                | Command::ClearConversation
                | Command::DeleteConversation(_)
                | Command::RefreshConversations
                | Command::ReloadHistory
                | Command::CredentialChanged
        )
    }
}

pub(super) struct MailboxParts {
    pub mailbox: Mailbox,
    pub cmd_rx: mpsc::UnboundedReceiver<Command>,
    pub kill_rx: watch::Receiver<bool>,
}

pub(super) struct Mailbox {
    cmd_tx: mpsc::UnboundedSender<Command>,
    kill_tx: watch::Sender<bool>,
    issued: AtomicU64,
}

impl Mailbox {
    #[inline]
    pub fn new() -> MailboxParts {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox {
                cmd_tx,
                kill_tx,
                issued: AtomicU64::new(0),
            },
            cmd_rx,
            kill_rx,
        }
    }

    /// Posts a command, counting it if it comes from a user.
    pub fn post(&self, cmd: Command) {
        let is_user_command = cmd.is_user_command();
        if let Err(err) = self.cmd_tx.send(cmd) {
            warn!("session has stopped, dropping {:?}", err.0);
            return;
        }
        if is_user_command {
            self.issued.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Returns how many user commands have been posted.
    #[inline]
    pub fn issued(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    #[inline]
    pub fn try_kill(&self) {
        self.kill_tx.send(true).ok();
    }
}
