use std::pin::Pin;
use std::sync::Arc;

use folio_api::{
    Backend, BackendError, ChatRequest, CodegenReply, CodegenRequest,
    Conversation, ConversationId, Credential, GatedChatRequest, ImageRequest,
    ImageResult, Message, Project,
};
use tracing::Instrument;

type BackendResult<T> = Result<T, Box<dyn BackendError>>;
type BoxedFuture<T> = Pin<Box<dyn Future<Output = BackendResult<T>> + Send>>;

trait BackendObject: Send + Sync + 'static {
    fn list_projects(&self) -> BoxedFuture<Vec<Project>>;

    fn chat(&self, req: ChatRequest) -> BoxedFuture<Option<String>>;

    fn gated_chat(
        &self,
        req: GatedChatRequest,
        credential: Credential,
    ) -> BoxedFuture<Option<String>>;

    fn generate_code(
        &self,
        req: CodegenRequest,
        credential: Credential,
    ) -> BoxedFuture<CodegenReply>;

    fn generate_image(
        &self,
        req: ImageRequest,
        credential: Credential,
    ) -> BoxedFuture<ImageResult>;

    fn create_conversation(
        &self,
        credential: Credential,
    ) -> BoxedFuture<Conversation>;

    fn list_conversations(
        &self,
        credential: Credential,
    ) -> BoxedFuture<Vec<Conversation>>;

    fn conversation_history(
        &self,
        id: ConversationId,
        credential: Credential,
    ) -> BoxedFuture<Vec<Message>>;

    fn delete_conversation(
        &self,
        id: ConversationId,
        credential: Credential,
    ) -> BoxedFuture<()>;
}

struct BackendObjectImpl<B: Backend>(B);

impl<B: Backend> BackendObject for BackendObjectImpl<B> {
    fn list_projects(&self) -> BoxedFuture<Vec<Project>> {
        erase("list projects", self.0.list_projects())
    }

    fn chat(&self, req: ChatRequest) -> BoxedFuture<Option<String>> {
        erase("chat", self.0.chat(&req))
    }

    fn gated_chat(
        &self,
        req: GatedChatRequest,
        credential: Credential,
    ) -> BoxedFuture<Option<String>> {
        erase("gated chat", self.0.gated_chat(&req, &credential))
    }

    fn generate_code(
        &self,
        req: CodegenRequest,
        credential: Credential,
    ) -> BoxedFuture<CodegenReply> {
        trace!("codegen request: {req:?}");
        erase("generate code", self.0.generate_code(&req, &credential))
    }

    fn generate_image(
        &self,
        req: ImageRequest,
        credential: Credential,
    ) -> BoxedFuture<ImageResult> {
        erase("generate image", self.0.generate_image(&req, &credential))
    }

    fn create_conversation(
        &self,
        credential: Credential,
    ) -> BoxedFuture<Conversation> {
        erase("create conversation", self.0.create_conversation(&credential))
    }

    fn list_conversations(
        &self,
        credential: Credential,
    ) -> BoxedFuture<Vec<Conversation>> {
        erase("list conversations", self.0.list_conversations(&credential))
    }

    fn conversation_history(
        &self,
        id: ConversationId,
        credential: Credential,
    ) -> BoxedFuture<Vec<Message>> {
        erase(
            "load history",
            self.0.conversation_history(id, &credential),
        )
    }

    fn delete_conversation(
        &self,
        id: ConversationId,
        credential: Credential,
    ) -> BoxedFuture<()> {
        erase(
            "delete conversation",
            self.0.delete_conversation(id, &credential),
        )
    }
}

fn erase<T, E, F>(op: &'static str, fut: F) -> BoxedFuture<T>
where
    T: Send + 'static,
    E: BackendError,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    Box::pin(
        async move {
            match fut.await {
                Ok(value) => {
                    trace!("finished");
                    Ok(value)
                }
                Err(err) => {
                    error!("got an error ({}): {err}", err.kind());
                    Err(Box::new(err) as Box<dyn BackendError>)
                }
            }
        }
        .instrument(debug_span!("backend request", op)),
    )
}

/// A type-erased handle to a [`Backend`].
///
/// The controller and the panels talk to the backend through this handle,
/// so none of them has to be generic over the backend type. Clones share
/// the same backend.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<dyn BackendObject>,
}

impl BackendClient {
    /// Wraps a backend.
    #[inline]
    pub fn new<B: Backend>(backend: B) -> Self {
        Self {
            inner: Arc::new(BackendObjectImpl(backend)),
        }
    }

    /// Lists the portfolio projects.
    #[inline]
    pub async fn list_projects(&self) -> BackendResult<Vec<Project>> {
        self.inner.list_projects().await
    }

    /// Sends a message to the anonymous assistant.
    #[inline]
    pub async fn chat(&self, req: ChatRequest) -> BackendResult<Option<String>> {
        self.inner.chat(req).await
    }

    /// Sends a message to the gated assistant.
    #[inline]
    pub async fn gated_chat(
        &self,
        req: GatedChatRequest,
        credential: Credential,
    ) -> BackendResult<Option<String>> {
        self.inner.gated_chat(req, credential).await
    }

    /// Sends a code-generation prompt.
    #[inline]
    pub async fn generate_code(
        &self,
        req: CodegenRequest,
        credential: Credential,
    ) -> BackendResult<CodegenReply> {
        self.inner.generate_code(req, credential).await
    }

    /// Generates an image from a prompt.
    #[inline]
    pub async fn generate_image(
        &self,
        req: ImageRequest,
        credential: Credential,
    ) -> BackendResult<ImageResult> {
        self.inner.generate_image(req, credential).await
    }

    /// Creates an empty conversation.
    #[inline]
    pub async fn create_conversation(
        &self,
        credential: Credential,
    ) -> BackendResult<Conversation> {
        self.inner.create_conversation(credential).await
    }

    /// Lists the conversations of the credential's owner.
    #[inline]
    pub async fn list_conversations(
        &self,
        credential: Credential,
    ) -> BackendResult<Vec<Conversation>> {
        self.inner.list_conversations(credential).await
    }

    /// Fetches the ordered history of a conversation.
    #[inline]
    pub async fn conversation_history(
        &self,
        id: ConversationId,
        credential: Credential,
    ) -> BackendResult<Vec<Message>> {
        self.inner.conversation_history(id, credential).await
    }

    /// Deletes a conversation.
    #[inline]
    pub async fn delete_conversation(
        &self,
        id: ConversationId,
        credential: Credential,
    ) -> BackendResult<()> {
        self.inner.delete_conversation(id, credential).await
    }
}
