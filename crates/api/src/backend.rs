use crate::credential::Credential;
use crate::error::BackendError;
use crate::request::{
    ChatRequest, CodegenRequest, GatedChatRequest, ImageRequest,
};
use crate::types::{
    CodegenReply, Conversation, ConversationId, ImageResult, Message, Project,
};

/// A type that represents the portfolio backend.
///
/// Every operation returns a future that is fully independent of `self`
/// and of the arguments, so callers can spawn it and drop the backend
/// anytime. Operations that need an identity take the bearer credential
/// explicitly; implementations must not cache it.
///
/// Once created, the backend should behave like a stateless object. The
/// client never retries, cancels or times out a request on its own.
pub trait Backend: Send + Sync + 'static {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Lists the projects of the portfolio gallery.
    fn list_projects(
        &self,
    ) -> impl Future<Output = Result<Vec<Project>, Self::Error>> + Send + 'static;

    /// Sends a message to the anonymous general chat.
    ///
    /// Resolves to `None` if the backend answered without a reply text.
    fn chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'static;

    /// Sends an input to the gated AI model.
    fn gated_chat(
        &self,
        req: &GatedChatRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'static;

    /// Sends a prompt to the conversational code generator.
    fn generate_code(
        &self,
        req: &CodegenRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<CodegenReply, Self::Error>> + Send + 'static;

    /// Generates an image from a prompt.
    fn generate_image(
        &self,
        req: &ImageRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<ImageResult, Self::Error>> + Send + 'static;

    /// Creates an empty conversation.
    fn create_conversation(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static;

    /// Lists the conversations owned by the identity.
    fn list_conversations(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static;

    /// Fetches the full ordered history of a conversation.
    ///
    /// Implementations must report a missing conversation with
    /// [`ErrorKind::NotFound`](crate::ErrorKind::NotFound).
    fn conversation_history(
        &self,
        id: ConversationId,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'static;

    /// Deletes a conversation.
    fn delete_conversation(
        &self,
        id: ConversationId,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;
}
