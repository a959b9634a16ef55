//! A backend for the portfolio REST API over HTTP.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use folio_api::{
    Backend, BackendError, ChatRequest, CodegenReply, CodegenRequest,
    Conversation, ConversationId, Credential, ErrorKind, GatedChatRequest,
    ImageRequest, ImageResult, Message, Project,
};
use reqwest::{Client, RequestBuilder, header};
use tracing::Instrument;

pub use config::{HttpConfig, HttpConfigBuilder};
use proto::{Endpoint, RawResponse};

/// Error type for [`HttpBackend`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
    status: Option<u16>,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
            status: None,
        }
    }

    #[inline]
    fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
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

/// The portfolio backend reached over HTTP.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: Arc<HttpConfig>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given configuration.
    #[inline]
    pub fn new(config: HttpConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Creates a new `HttpBackend` sharing an existing HTTP client.
    #[inline]
    pub fn with_client(config: HttpConfig, client: Client) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    fn request(
        &self,
        endpoint: Endpoint,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let builder = self
            .client
            .request(endpoint.method(), self.config.url(&endpoint.path()))
            .header(header::USER_AGENT, &self.config.user_agent)
            .header(header::ACCEPT, "application/json");
        match credential {
            Some(credential) => {
                builder.header(header::AUTHORIZATION, credential.bearer())
            }
            None => builder,
        }
    }
}

/// Sends the request and decodes the buffered response.
fn execute<T, D>(
    endpoint: Endpoint,
    builder: RequestBuilder,
    decode: D,
) -> impl Future<Output = Result<T, Error>> + Send + 'static
where
    T: Send + 'static,
    D: FnOnce(&RawResponse<'_>) -> Result<T, Error> + Send + 'static,
{
    let resp_fut = builder.send();
    async move {
        let resp = resp_fut.await.map_err(|err| {
            warn!("request failed: {err}");
            Error::new(format!("{err}"), ErrorKind::Transport)
        })?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        let body = resp.text().await.map_err(|err| {
            Error::new(format!("{err}"), ErrorKind::Transport)
        })?;
        trace!("got response ({status}): {body}");

        let raw = RawResponse {
            status: status.as_u16(),
            reason: status.canonical_reason(),
            content_type: content_type.as_deref(),
            body: &body,
        };
        proto::check_status(endpoint, &raw)?;
        decode(&raw)
    }
    .instrument(debug_span!("http", %endpoint))
}

impl Backend for HttpBackend {
    type Error = Error;

    fn list_projects(
        &self,
    ) -> impl Future<Output = Result<Vec<Project>, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::Projects;
        execute(endpoint, self.request(endpoint, None), proto::decode_projects)
    }

    fn chat(
        &self,
        req: &ChatRequest,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::Chat;
        let builder = self.request(endpoint, None).json(req);
        execute(endpoint, builder, proto::decode_reply)
    }

    fn gated_chat(
        &self,
        req: &GatedChatRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::GatedChat;
        let builder = self.request(endpoint, Some(credential)).json(req);
        execute(endpoint, builder, proto::decode_reply)
    }

    fn generate_code(
        &self,
        req: &CodegenRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<CodegenReply, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::Codegen;
        let builder = self.request(endpoint, Some(credential)).json(req);
        execute(endpoint, builder, proto::decode_codegen)
    }

    fn generate_image(
        &self,
        req: &ImageRequest,
        credential: &Credential,
    ) -> impl Future<Output = Result<ImageResult, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::Image;
        let builder = self.request(endpoint, Some(credential)).json(req);
        execute(endpoint, builder, proto::decode_image)
    }

    fn create_conversation(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::CreateConversation;
        let builder = self.request(endpoint, Some(credential));
        execute(endpoint, builder, proto::decode_conversation)
    }

    fn list_conversations(
        &self,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Conversation>, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::ListConversations;
        let builder = self.request(endpoint, Some(credential));
        execute(endpoint, builder, proto::decode_conversations)
    }

    fn conversation_history(
        &self,
        id: ConversationId,
        credential: &Credential,
    ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + 'static
    {
        let endpoint = Endpoint::History(id);
        let builder = self.request(endpoint, Some(credential));
        execute(endpoint, builder, proto::decode_history)
    }

    fn delete_conversation(
        &self,
        id: ConversationId,
        credential: &Credential,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let endpoint = Endpoint::DeleteConversation(id);
        let builder = self.request(endpoint, Some(credential));
        // Whatever the body says, a 2xx means the conversation is gone.
        execute(endpoint, builder, |_| Ok(()))
    }
}
