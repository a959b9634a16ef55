use std::collections::HashMap;
use std::sync::{Arc, Weak};

use folio_api::{
    BackendError, CodegenReply, CodegenRequest, Conversation, ConversationId,
    Credential, ErrorKind, Message,
};
use tokio::select;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::approval::DeleteApproval;
use super::mailbox::{Command, Mailbox};
use super::snapshot::{
    CONVERSATION_GONE, HISTORY_FAILED, Notice, NoticeKind, SessionSnapshot,
};
use crate::backend_client::BackendClient;
use crate::conversation_list::ConversationList;
use crate::identity::{Identity, SignInRequired};
use crate::store::CONVERSATION_ID_KEY;

/// The reply shown when the backend answered without any text.
pub const NO_CODE_GENERATED: &str = "No code generated.";

pub(super) type DeleteRequestFn = Box<dyn Fn(DeleteApproval) + Send + Sync>;

/// State owned by the controller loop. Nothing else touches it.
pub(super) struct SessionState {
    backend: BackendClient,
    identity: Identity,
    on_delete_request: Option<DeleteRequestFn>,

    active_id: Option<ConversationId>,
    transcript: Vec<Message>,
    busy: bool,
    history_loads: HistoryLoads,
    notice: Option<Notice>,
    conversations: ConversationList,
    list_generation: u64,
    pending_deletes: usize,
    // The active id and signed-in state the derived effects last ran for.
    observed: Option<(Option<ConversationId>, bool)>,

    running_tasks: HashMap<u64, JoinHandle<()>>,
    next_task_id: u64,
    revision: u64,
    handled_commands: u64,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionState {
    pub(super) fn new(
        backend: BackendClient,
        identity: Identity,
        on_delete_request: Option<DeleteRequestFn>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        let active_id = restore_active_id(&identity);
        Self {
            backend,
            identity,
            on_delete_request,
            active_id,
            transcript: vec![],
            busy: false,
            history_loads: HistoryLoads::default(),
            notice: None,
            conversations: Default::default(),
            list_generation: 0,
            pending_deletes: 0,
            observed: None,
            running_tasks: Default::default(),
            next_task_id: 1,
            revision: 0,
            handled_commands: 0,
            snapshot_tx,
        }
    }

    fn handle(&mut self, cmd: Command, mailbox: &Arc<Mailbox>) {
        if cmd.is_user_command() {
            self.handled_commands += 1;
        }

        match cmd {
            Command::SendPrompt(text) => self.send_prompt(&text, mailbox),
            Command::StartNewConversation => {
                self.start_new_conversation(mailbox);
            }
            Command::SelectConversation(id) => self.select_conversation(id),
            Command::ClearConversation => self.clear_conversation(),
            Command::DeleteConversation(id) => {
                self.request_delete(id, mailbox);
            }
            Command::RefreshConversations => {
                self.refresh_conversations(mailbox);
            }
            Command::ReloadHistory => self.reload_history(mailbox),
            Command::CredentialChanged => {
                debug!("credential changed");
            }
            Command::PromptFinished {
                requested_id,
                result,
            } => self.prompt_finished(requested_id, result),
            Command::ConversationCreated(result) => {
                self.conversation_created(result);
            }
            Command::HistoryLoaded { id, result } => {
                self.history_loaded(id, result);
            }
            Command::ConversationsListed { generation, result } => {
                self.conversations_listed(generation, result);
            }
            Command::DeleteDecided { id, approved } => {
                self.delete_decided(id, approved, mailbox);
            }
            Command::ConversationDeleted { id, result } => {
                self.conversation_deleted(id, result);
            }
            Command::TaskEnded(task_id) => {
                if self.running_tasks.remove(&task_id).is_none() {
                    warn!("unknown task {task_id} has ended");
                }
                return;
            }
        }

        self.apply_effects(mailbox);
        self.publish();
    }

    fn send_prompt(&mut self, text: &str, mailbox: &Arc<Mailbox>) {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring an empty prompt");
            return;
        }
        if self.busy {
            debug!("busy, ignoring prompt");
            return;
        }
        let Some(credential) = self.credential_or_notice() else {
            return;
        };

        self.notice = None;
        self.transcript.push(Message::user(text));
        self.busy = true;

        let requested_id = self.active_id;
        let request = CodegenRequest {
            input: text.to_owned(),
            conversation_id: requested_id,
        };
        let backend = self.backend.clone();
        self.spawn_task(mailbox, async move {
            let result = backend.generate_code(request, credential).await;
            Command::PromptFinished {
                requested_id,
                result,
            }
        });
    }

    fn prompt_finished(
        &mut self,
        requested_id: Option<ConversationId>,
        result: Result<CodegenReply, Box<dyn BackendError>>,
    ) {
        self.busy = false;
        match result {
            Ok(reply) => {
                let text = reply
                    .response
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| NO_CODE_GENERATED.to_owned());
                self.transcript.push(Message::assistant(text));

                // A prompt that started a conversation adopts its id, even
                // if another conversation was selected meanwhile.
                if requested_id.is_none() {
                    if let Some(id) = reply.conversation_id {
                        info!("conversation {id} started");
                        self.set_active_id(Some(id));
                    }
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.transcript
                    .push(Message::assistant(format!("Error: {message}")));
                self.notice = Some(Notice::new(NoticeKind::RequestFailed, message));
            }
        }
    }

    fn start_new_conversation(&mut self, mailbox: &Arc<Mailbox>) {
        if self.busy {
            debug!("busy, ignoring new conversation");
            return;
        }
        let Some(credential) = self.credential_or_notice() else {
            return;
        };

        self.busy = true;
        let backend = self.backend.clone();
        self.spawn_task(mailbox, async move {
            let result = backend.create_conversation(credential).await;
            Command::ConversationCreated(result)
        });
    }

    fn conversation_created(
        &mut self,
        result: Result<Conversation, Box<dyn BackendError>>,
    ) {
        self.busy = false;
        match result {
            Ok(conversation) => {
                info!("conversation {} created", conversation.id);
                self.transcript.clear();
                self.notice = None;
                self.set_active_id(Some(conversation.id));
                self.conversations.prepend(conversation);
            }
            Err(err) => {
                self.notice =
                    Some(Notice::new(NoticeKind::RequestFailed, err.to_string()));
            }
        }
    }

    fn select_conversation(&mut self, id: ConversationId) {
        if self.active_id == Some(id) {
            debug!("conversation {id} is already active");
            return;
        }
        debug!("selecting conversation {id}");
        self.set_active_id(Some(id));
    }

    fn clear_conversation(&mut self) {
        self.transcript.clear();
        self.notice = None;
        self.set_active_id(None);
    }

    fn reload_history(&mut self, mailbox: &Arc<Mailbox>) {
        let Some(id) = self.active_id else {
            debug!("no active conversation to reload");
            return;
        };
        let Some(credential) = self.credential_or_notice() else {
            return;
        };
        self.load_history(id, credential, mailbox);
    }

    fn load_history(
        &mut self,
        id: ConversationId,
        credential: Credential,
        mailbox: &Arc<Mailbox>,
    ) {
        self.history_loads.start(id);
        let backend = self.backend.clone();
        self.spawn_task(mailbox, async move {
            let result = backend.conversation_history(id, credential).await;
            Command::HistoryLoaded { id, result }
        });
    }

    fn history_loaded(
        &mut self,
        id: ConversationId,
        result: Result<Vec<Message>, Box<dyn BackendError>>,
    ) {
        self.history_loads.finish(id);
        if self.active_id != Some(id) {
            debug!("discarding history of inactive conversation {id}");
            return;
        }

        match result {
            Ok(messages) => {
                debug!("loaded {} messages of conversation {id}", messages.len());
                self.transcript = messages;
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!("conversation {id} no longer exists");
                self.transcript.clear();
                self.set_active_id(None);
                self.notice =
                    Some(Notice::new(NoticeKind::ConversationGone, CONVERSATION_GONE));
            }
            Err(_) => {
                self.notice =
                    Some(Notice::new(NoticeKind::HistoryFailed, HISTORY_FAILED));
            }
        }
    }

    fn refresh_conversations(&mut self, mailbox: &Arc<Mailbox>) {
        match self.identity.valid_credential() {
            Ok(credential) => self.refresh_list(credential, mailbox),
            Err(err) => self.conversations.set_error(err.to_string()),
        }
    }

    fn refresh_list(&mut self, credential: Credential, mailbox: &Arc<Mailbox>) {
        self.list_generation += 1;
        let generation = self.list_generation;
        self.conversations.begin_refresh();
        let backend = self.backend.clone();
        self.spawn_task(mailbox, async move {
            let result = backend.list_conversations(credential).await;
            Command::ConversationsListed { generation, result }
        });
    }

    fn conversations_listed(
        &mut self,
        generation: u64,
        result: Result<Vec<Conversation>, Box<dyn BackendError>>,
    ) {
        if generation != self.list_generation {
            debug!("discarding outdated conversation list");
            return;
        }
        self.conversations
            .finish_refresh(result.map_err(|err| err.to_string()));
    }

    fn request_delete(&mut self, id: ConversationId, mailbox: &Arc<Mailbox>) {
        let Some(on_delete_request) = &self.on_delete_request else {
            warn!("nobody can confirm deleting conversation {id}, refusing");
            return;
        };

        let label = match self.conversations.get(id) {
            Some(conversation) => conversation.label(),
            None => Conversation::with_id(id).label(),
        };
        self.pending_deletes += 1;
        let mailbox = Arc::clone(mailbox);
        let approval = DeleteApproval::new(id, label, move |approved| {
            mailbox.post(Command::DeleteDecided { id, approved });
        });
        on_delete_request(approval);
    }

    fn delete_decided(
        &mut self,
        id: ConversationId,
        approved: bool,
        mailbox: &Arc<Mailbox>,
    ) {
        if !approved {
            debug!("deleting conversation {id} was rejected");
            self.pending_deletes = self.pending_deletes.saturating_sub(1);
            return;
        }
        let credential = match self.identity.valid_credential() {
            Ok(credential) => credential,
            Err(err) => {
                self.pending_deletes = self.pending_deletes.saturating_sub(1);
                self.conversations.set_error(err.to_string());
                return;
            }
        };

        let backend = self.backend.clone();
        self.spawn_task(mailbox, async move {
            let result = backend.delete_conversation(id, credential).await;
            Command::ConversationDeleted { id, result }
        });
    }

    fn conversation_deleted(
        &mut self,
        id: ConversationId,
        result: Result<(), Box<dyn BackendError>>,
    ) {
        self.pending_deletes = self.pending_deletes.saturating_sub(1);
        match result {
            Ok(()) => {
                info!("conversation {id} deleted");
                self.conversations.remove(id);
                if self.active_id == Some(id) {
                    self.clear_conversation();
                }
            }
            Err(err) => self.conversations.set_error(err.to_string()),
        }
    }

    /// Runs the effects that follow a change of the active conversation or
    /// of the signed-in state: reload the history, refresh the list.
    fn apply_effects(&mut self, mailbox: &Arc<Mailbox>) {
        let key = (self.active_id, self.identity.is_signed_in());
        let previous = self.observed.replace(key);
        if previous == Some(key) {
            return;
        }

        if previous.is_some_and(|(_, signed_in)| signed_in) && !key.1 {
            debug!("signed out, dropping the conversation list");
            self.conversations = ConversationList::default();
            self.list_generation += 1;
        }

        let Ok(credential) = self.identity.valid_credential() else {
            return;
        };
        if let Some(id) = self.active_id {
            self.load_history(id, credential.clone(), mailbox);
        }
        self.refresh_list(credential, mailbox);
    }

    fn credential_or_notice(&mut self) -> Option<Credential> {
        match self.identity.valid_credential() {
            Ok(credential) => Some(credential),
            Err(SignInRequired) => {
                self.notice = Some(Notice::new(
                    NoticeKind::SignInRequired,
                    SignInRequired.to_string(),
                ));
                None
            }
        }
    }

    fn set_active_id(&mut self, id: Option<ConversationId>) {
        self.active_id = id;
        let store = self.identity.store();
        match id {
            Some(id) => store.set(CONVERSATION_ID_KEY, &id.to_string()),
            None => store.remove(CONVERSATION_ID_KEY),
        }
    }

    fn publish(&mut self) {
        self.revision += 1;
        self.snapshot_tx.send_replace(SessionSnapshot {
            revision: self.revision,
            handled_commands: self.handled_commands,
            active_id: self.active_id,
            transcript: self.transcript.clone(),
            busy: self.busy,
            history_loading: self
                .active_id
                .is_some_and(|id| self.history_loads.is_loading(id)),
            notice: self.notice.clone(),
            conversations: self.conversations.clone(),
            pending_deletes: self.pending_deletes,
            signed_in: self.identity.is_signed_in(),
        });
    }

    fn spawn_task<Fut>(&mut self, mailbox: &Arc<Mailbox>, fut: Fut)
    where
        Fut: Future<Output = Command> + Send + 'static,
    {
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let mailbox = Arc::clone(mailbox);
        let task = tokio::spawn(
            async move {
                let cmd = fut.await;
                mailbox.post(cmd);
                mailbox.post(Command::TaskEnded(task_id));
            }
            .instrument(trace_span!("session task", task_id)),
        );
        self.running_tasks.insert(task_id, task);
    }

    fn abort_tasks(&mut self) {
        for (task_id, task) in self.running_tasks.drain() {
            trace!("aborting task {task_id}");
            task.abort();
        }
    }
}

/// History loads in flight, counted per conversation.
#[derive(Debug, Default)]
pub(super) struct HistoryLoads {
    in_flight: HashMap<ConversationId, usize>,
}

impl HistoryLoads {
    pub(super) fn start(&mut self, id: ConversationId) {
        *self.in_flight.entry(id).or_default() += 1;
    }

    pub(super) fn finish(&mut self, id: ConversationId) {
        if let Some(count) = self.in_flight.get_mut(&id) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(&id);
            }
        }
    }

    pub(super) fn is_loading(&self, id: ConversationId) -> bool {
        self.in_flight.contains_key(&id)
    }
}

fn restore_active_id(identity: &Identity) -> Option<ConversationId> {
    let store = identity.store();
    let raw = store.get(CONVERSATION_ID_KEY)?;
    match raw.parse() {
        Ok(id) => {
            debug!("restored active conversation {id}");
            Some(id)
        }
        Err(err) => {
            warn!("ignoring stored conversation id {raw:?}: {err}");
            store.remove(CONVERSATION_ID_KEY);
            None
        }
    }
}

pub(super) async fn run_session(
    mailbox: Weak<Mailbox>,
    mut state: SessionState,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    if let Some(mailbox) = mailbox.upgrade() {
        state.apply_effects(&mailbox);
        state.publish();
    }

    loop {
        let cmd = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                cmd
            }
        };
        trace!("received command: {cmd:?}");

        let Some(mailbox) = mailbox.upgrade() else {
            warn!("last handle has been dropped, discard the command");
            break;
        };
        let proc_span = trace_span!("proc cmd");
        proc_span.in_scope(|| {
            state.handle(cmd, &mailbox);
            trace!("finished");
        });
    }

    state.abort_tasks();
    debug!("will terminate");
}
