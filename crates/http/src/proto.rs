use std::fmt::{self, Display, Formatter};

use folio_api::{
    CodegenReply, Conversation, ConversationId, ErrorKind, ImageResult,
    Message, Project,
};
use mime::Mime;
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Error;

// ---------
// Endpoints
// ---------

/// The REST endpoints of the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Projects,
    Chat,
    GatedChat,
    Codegen,
    Image,
    CreateConversation,
    ListConversations,
    History(ConversationId),
    DeleteConversation(ConversationId),
}

impl Endpoint {
    pub fn method(&self) -> Method {
        match self {
            Endpoint::Projects
            | Endpoint::ListConversations
            | Endpoint::History(_) => Method::GET,
            Endpoint::Chat
            | Endpoint::GatedChat
            | Endpoint::Codegen
            | Endpoint::Image
            | Endpoint::CreateConversation => Method::POST,
            Endpoint::DeleteConversation(_) => Method::DELETE,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Endpoint::Projects => "/api/projects/".to_owned(),
            Endpoint::Chat => "/api/chat/".to_owned(),
            Endpoint::GatedChat => "/api/custom-ai-model/".to_owned(),
            Endpoint::Codegen => "/api/codegen/".to_owned(),
            Endpoint::Image => "/api/flux-image/".to_owned(),
            Endpoint::CreateConversation => "/api/conversation/".to_owned(),
            Endpoint::ListConversations => {
                "/api/conversation/list/".to_owned()
            }
            Endpoint::History(id) => format!("/api/conversation/{id}/history/"),
            Endpoint::DeleteConversation(id) => {
                format!("/api/conversation/{id}/")
            }
        }
    }

    /// The message shown when the backend fails without telling why.
    fn fallback_message(&self) -> &'static str {
        match self {
            Endpoint::Projects => "Failed to load projects.",
            Endpoint::Chat => "Failed to get a chat response.",
            Endpoint::GatedChat => "Failed to get response from AI model.",
            Endpoint::Codegen => "Failed to get code generation result.",
            Endpoint::Image => "Failed to generate image.",
            Endpoint::CreateConversation => {
                "Failed to create new conversation."
            }
            Endpoint::ListConversations => "Failed to fetch conversations.",
            Endpoint::History(_) => "Failed to fetch conversation history.",
            Endpoint::DeleteConversation(_) => "Failed to delete conversation.",
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method(), self.path())
    }
}

// ------------------------------
// Types received from the server
// ------------------------------

/// A fully buffered response.
#[derive(Clone, Copy, Debug)]
pub struct RawResponse<'a> {
    pub status: u16,
    pub reason: Option<&'a str>,
    pub content_type: Option<&'a str>,
    pub body: &'a str,
}

impl RawResponse<'_> {
    #[inline]
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Deserialize)]
struct ReplyBody {
    response: Option<String>,
}

#[derive(Deserialize)]
struct ImageBody {
    image_url: Option<String>,
    image_base64: Option<String>,
}

#[derive(Deserialize)]
struct ConversationsBody {
    #[serde(default)]
    conversations: Value,
}

#[derive(Deserialize)]
struct HistoryBody {
    history: Vec<Message>,
}

// --------
// Decoding
// --------

/// Turns a non-2xx response into an error carrying the message the user
/// should see.
pub fn check_status(endpoint: Endpoint, raw: &RawResponse<'_>) -> Result<(), Error> {
    if raw.is_success() {
        return Ok(());
    }

    let status = raw.status;
    let kind = match status {
        404 => ErrorKind::NotFound,
        401 | 403 => ErrorKind::Unauthorized,
        _ => ErrorKind::Status,
    };
    let reported = error_field(raw.body);
    let message = match endpoint {
        Endpoint::Projects => format!("HTTP error, status: {status}"),
        Endpoint::Chat => {
            let detail = reported.as_deref().or(raw.reason).unwrap_or_default();
            format!("Backend API error: {status} - {detail}")
        }
        // The conversation list, history and delete endpoints only ever
        // show their own message.
        Endpoint::ListConversations
        | Endpoint::History(_)
        | Endpoint::DeleteConversation(_) => {
            endpoint.fallback_message().to_owned()
        }
        _ => reported.unwrap_or_else(|| endpoint.fallback_message().to_owned()),
    };
    Err(Error::new(message, kind).with_status(status))
}

fn error_field(body: &str) -> Option<String> {
    let value = serde_json::from_str::<Value>(body).ok()?;
    let error = value.get("error")?.as_str()?.trim();
    if error.is_empty() {
        None
    } else {
        Some(error.to_owned())
    }
}

fn decode_json<T: DeserializeOwned>(raw: &RawResponse<'_>) -> Result<T, Error> {
    if let Some(content_type) = raw.content_type {
        let is_json = content_type
            .parse::<Mime>()
            .map(|m| {
                m.subtype() == mime::JSON
                    || m.suffix().is_some_and(|s| s == mime::JSON)
            })
            .unwrap_or(false);
        if !is_json {
            return Err(Error::new(
                format!("Unexpected content type: {content_type}"),
                ErrorKind::InvalidResponse,
            ));
        }
    }
    serde_json::from_str(raw.body).map_err(|err| {
        Error::new(format!("{err}"), ErrorKind::InvalidResponse)
    })
}

#[inline]
pub fn decode_projects(raw: &RawResponse<'_>) -> Result<Vec<Project>, Error> {
    decode_json(raw)
}

#[inline]
pub fn decode_reply(raw: &RawResponse<'_>) -> Result<Option<String>, Error> {
    let body: ReplyBody = decode_json(raw)?;
    Ok(body.response.filter(|text| !text.is_empty()))
}

#[inline]
pub fn decode_codegen(raw: &RawResponse<'_>) -> Result<CodegenReply, Error> {
    let mut reply: CodegenReply = decode_json(raw)?;
    reply.response = reply.response.filter(|text| !text.is_empty());
    Ok(reply)
}

pub fn decode_image(raw: &RawResponse<'_>) -> Result<ImageResult, Error> {
    let body: ImageBody = decode_json(raw)?;
    match (body.image_url, body.image_base64) {
        (Some(url), _) if !url.is_empty() => Ok(ImageResult::Url(url)),
        (_, Some(data)) if !data.is_empty() => Ok(ImageResult::Base64(data)),
        _ => Err(Error::new(
            "The backend returned no image.",
            ErrorKind::InvalidResponse,
        )),
    }
}

#[inline]
pub fn decode_conversation(raw: &RawResponse<'_>) -> Result<Conversation, Error> {
    decode_json(raw)
}

pub fn decode_conversations(
    raw: &RawResponse<'_>,
) -> Result<Vec<Conversation>, Error> {
    let body: ConversationsBody = decode_json(raw)?;
    if !body.conversations.is_array() {
        debug!("conversation list is not an array, treating as empty");
        return Ok(vec![]);
    }
    serde_json::from_value(body.conversations).map_err(|err| {
        Error::new(format!("{err}"), ErrorKind::InvalidResponse)
    })
}

#[inline]
pub fn decode_history(raw: &RawResponse<'_>) -> Result<Vec<Message>, Error> {
    let body: HistoryBody = decode_json(raw)?;
    Ok(body.history)
}
