//! A local fake backend for testing purpose.

mod preset;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use folio_api::{
    Backend, BackendError, ChatRequest, CodegenReply, CodegenRequest,
    Conversation, ConversationId, Credential, ErrorKind, GatedChatRequest,
    ImageRequest, ImageResult, Message, Project,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<u16>,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }

    #[inline]
    fn status(&self) -> Option<u16> {
        self.status
    }
}

impl From<Failure> for Error {
    fn from(failure: Failure) -> Self {
        Self {
            message: failure.message,
            kind: failure.kind,
            status: failure.status,
        }
    }
}

struct StoredConversation {
    meta: Conversation,
    messages: Vec<Message>,
}

#[derive(Default)]
struct State {
    conversations: BTreeMap<ConversationId, StoredConversation>,
    next_id: u64,
    projects: Vec<Project>,
    codegen_replies: VecDeque<String>,
    image: Option<ImageResult>,
    failures: HashMap<Operation, VecDeque<Failure>>,
    requests: Vec<RecordedRequest>,
    delay: Option<Duration>,
    delays: HashMap<Operation, Duration>,
}

impl State {
    fn allocate_id(&mut self) -> ConversationId {
        self.next_id = self.next_id.max(1);
        let id = ConversationId(self.next_id);
        self.next_id += 1;
        id
    }

    fn insert_conversation(&mut self, id: ConversationId) -> Conversation {
        let now = Utc::now();
        let meta = Conversation {
            id,
            title: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        self.conversations.insert(
            id,
            StoredConversation {
                meta: meta.clone(),
                messages: vec![],
            },
        );
        meta
    }

    fn conversation_mut(
        &mut self,
        id: ConversationId,
    ) -> Result<&mut StoredConversation, Error> {
        self.conversations
            .get_mut(&id)
            .ok_or_else(|| Failure::status(404, "Conversation not found.").into())
    }
}

/// A local fake backend for testing purpose.
///
/// The backend keeps real conversations in memory: code-generation
/// prompts are recorded into their conversation and can be replayed
/// through the history endpoint. Replies are scripted, or echo the
/// input when nothing is scripted.
///
/// Clones share the same state, so a test can keep one handle to
/// script failures and inspect requests while another one is owned by
/// the code under test.
///
/// # Note
///
/// Every request clones its inputs and locks a global mutex. You should
/// only use it for testing.
#[derive(Clone, Default)]
pub struct TestBackend {
    state: Arc<Mutex<State>>,
}

impl TestBackend {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, State> {
        lock(&self.state)
    }

    /// Delays every response by the given duration.
    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        self.lock().delay = Some(duration);
    }

    /// Delays the responses of one operation, overriding
    /// [`set_delay`](Self::set_delay) for it.
    #[inline]
    pub fn set_operation_delay(&self, operation: Operation, duration: Duration) {
        self.lock().delays.insert(operation, duration);
    }

    /// Sets the id the next created conversation will get.
    #[inline]
    pub fn set_next_id(&self, id: u64) {
        self.lock().next_id = id;
    }

    /// Creates a conversation with the given id and messages.
    pub fn add_conversation(
        &self,
        id: ConversationId,
        messages: impl Into<Vec<Message>>,
    ) {
        let mut state = self.lock();
        state.insert_conversation(id);
        if let Some(stored) = state.conversations.get_mut(&id) {
            stored.messages = messages.into();
        }
        state.next_id = state.next_id.max(id.0 + 1);
    }

    /// Queues the text of the next code-generation reply.
    #[inline]
    pub fn add_codegen_reply<S: Into<String>>(&self, reply: S) {
        self.lock().codegen_replies.push_back(reply.into());
    }

    /// Sets the image returned by the image generator.
    #[inline]
    pub fn set_image(&self, image: ImageResult) {
        self.lock().image = Some(image);
    }

    /// Adds a project to the gallery.
    #[inline]
    pub fn add_project(&self, project: Project) {
        self.lock().projects.push(project);
    }

    /// Makes the next request of `operation` fail.
    #[inline]
    pub fn fail_next(&self, operation: Operation, failure: Failure) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(failure);
    }

    /// Returns all requests received so far.
    #[inline]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Returns how many requests of `operation` were received.
    pub fn request_count(&self, operation: Operation) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|req| req.operation == operation)
            .count()
    }

    /// Returns the ids of the stored conversations.
    pub fn conversation_ids(&self) -> Vec<ConversationId> {
        self.lock().conversations.keys().copied().collect()
    }

    /// Returns the stored messages of a conversation.
    pub fn messages(&self, id: ConversationId) -> Option<Vec<Message>> {
        self.lock()
            .conversations
            .get(&id)
            .map(|stored| stored.messages.clone())
    }

    /// Records the request and returns a future that runs `f` against the
    /// state once the delay has elapsed.
    fn respond<T, F>(
        &self,
        request: RecordedRequest,
        credential: Option<&Credential>,
        f: F,
    ) -> impl Future<Output = Result<T, Error>> + Send + 'static + use<T, F>
    where
        T: Send + 'static,
        F: FnOnce(&mut State) -> Result<T, Error> + Send + 'static,
    {
        let operation = request.operation;
        let rejected = credential.is_some_and(Credential::is_expired);
        let delay = {
            let mut state = self.lock();
            state.requests.push(request);
            state.delays.get(&operation).copied().or(state.delay)
        };
        let shared = Arc::clone(&self.state);
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            let mut state = lock(&shared);
            let failure = state
                .failures
                .get_mut(&operation)
                .and_then(VecDeque::pop_front);
            if let Some(failure) = failure {
                return Err(failure.into());
            }
            if rejected {
                return Err(Failure::status(401, "Invalid token.").into());
            }
            f(&mut state)
        }
    }
}

#[inline]
fn lock(state: &Mutex<State>) -> MutexGuard<'_, State> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Backend for TestBackend {
    type Error = crate::Error;

    fn list_projects(
        &self,
    ) -> impl Future<Output = Result<Vec<Project>, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::ListProjects,
            conversation_id: None,
            text: None,
        };
        self.respond(request, None, |state| Ok(state.projects.clone()))
    }

    fn chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::Chat,
            conversation_id: None,
            text: Some(req.message.clone()),
        };
        let reply = format!("You said {}", req.message);
        self.respond(request, None, move |_| Ok(Some(reply)))
    }

    fn gated_chat(
        &self,
        req: &GatedChatRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::GatedChat,
            conversation_id: None,
            text: Some(req.input.clone()),
        };
        let verified = !req.recaptcha_token.is_empty();
        let reply = format!("You said {}", req.input);
        self.respond(request, Some(credential), move |_| {
            if !verified {
                return Err(Failure::status(400, "reCAPTCHA verification failed.")
                    .into());
            }
            Ok(Some(reply))
        })
    }

    fn generate_code(
        &self,
        req: &CodegenRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<CodegenReply, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::GenerateCode,
            conversation_id: req.conversation_id,
            text: Some(req.input.clone()),
        };
        let req = req.clone();
        self.respond(request, Some(credential), move |state| {
            let id = match req.conversation_id {
                Some(id) => id,
                None => {
                    let id = state.allocate_id();
                    state.insert_conversation(id);
                    id
                }
            };
            let reply = state
                .codegen_replies
                .pop_front()
                .unwrap_or_else(|| format!("You said {}", req.input));
            let stored = state.conversation_mut(id)?;
            stored.messages.push(Message::user(req.input));
            stored.messages.push(Message::assistant(reply.clone()));
            stored.meta.updated_at = Some(Utc::now());
            Ok(CodegenReply {
                response: Some(reply),
                conversation_id: Some(id),
            })
        })
    }

    fn generate_image(
        &self,
        req: &ImageRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<ImageResult, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::GenerateImage,
            conversation_id: None,
            text: Some(req.prompt.clone()),
        };
        self.respond(request, Some(credential), |state| {
            Ok(state.image.clone().unwrap_or_else(|| {
                ImageResult::Url("https://images.test/generated.png".to_owned())
            }))
        })
    }

    fn create_conversation(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::CreateConversation,
            conversation_id: None,
            text: None,
        };
        self.respond(request, Some(credential), |state| {
            let id = state.allocate_id();
            Ok(state.insert_conversation(id))
        })
    }

    fn list_conversations(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::ListConversations,
            conversation_id: None,
            text: None,
        };
        self.respond(request, Some(credential), |state| {
            // Most recent first.
            Ok(state
                .conversations
                .values()
                .rev()
                .map(|stored| stored.meta.clone())
                .collect())
        })
    }

    fn conversation_history(
        &self,
        id: ConversationId,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'static
    {
        let request = RecordedRequest {
            operation: Operation::ConversationHistory,
            conversation_id: Some(id),
            text: None,
        };
        self.respond(request, Some(credential), move |state| {
            Ok(state.conversation_mut(id)?.messages.clone())
        })
    }

    fn delete_conversation(
        &self,
        id: ConversationId,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let request = RecordedRequest {
            operation: Operation::DeleteConversation,
            conversation_id: Some(id),
            text: None,
        };
        self.respond(request, Some(credential), move |state| {
            state
                .conversations
                .remove(&id)
                .map(|_| ())
                .ok_or_else(|| Failure::status(404, "Conversation not found.").into())
        })
    }
}
