use std::fmt::{self, Display, Formatter};
use std::num::ParseIntError;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a code-generation conversation, assigned by the backend.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

impl Display for ConversationId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for ConversationId {
    type Err = ParseIntError;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(ConversationId)
    }
}

impl From<u64> for ConversationId {
    #[inline]
    fn from(value: u64) -> Self {
        ConversationId(value)
    }
}

/// Display metadata of a conversation, as listed by the backend.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// The backend-assigned identifier.
    pub id: ConversationId,
    /// Optional human-readable title.
    #[serde(default)]
    pub title: Option<String>,
    /// When the conversation was started.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// When the conversation last changed.
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Conversation {
    /// Creates a conversation entry with no metadata besides the id.
    #[inline]
    pub fn with_id(id: ConversationId) -> Self {
        Self {
            id,
            title: None,
            created_at: None,
            updated_at: None,
        }
    }

    /// Returns the label shown in conversation pickers.
    pub fn label(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(title) if !title.is_empty() => title.to_owned(),
            _ => format!("Conversation #{}", self.id),
        }
    }
}

/// The author of a message.
///
/// On the wire the role is a free-form string. Only `"assistant"` is
/// recognized as the assistant; any other value is attributed to the user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "&'static str")]
pub enum Role {
    /// The person using the client.
    User,
    /// The AI model behind the backend.
    Assistant,
}

impl From<String> for Role {
    #[inline]
    fn from(value: String) -> Self {
        if value == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

impl From<Role> for &'static str {
    #[inline]
    fn from(value: Role) -> Self {
        match value {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message of a transcript.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// Who wrote the message.
    pub role: Role,
    /// The text, which may contain fenced code blocks.
    #[serde(rename = "content")]
    pub text: String,
}

impl Message {
    /// Creates a user message.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Creates an assistant message.
    #[inline]
    pub fn assistant<S: Into<String>>(text: S) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// The reply of a code-generation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenReply {
    /// The assistant text, if the backend produced any.
    #[serde(default)]
    pub response: Option<String>,
    /// The conversation the exchange was recorded in.
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
}

/// A generated image.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageResult {
    /// The image is hosted and can be fetched from this URL.
    Url(String),
    /// The image is inlined as base64-encoded PNG data.
    Base64(String),
}

impl ImageResult {
    /// Returns a URL that can be handed to an image viewer, turning inline
    /// data into a `data:` URL.
    pub fn to_url(&self) -> String {
        match self {
            ImageResult::Url(url) => url.clone(),
            ImageResult::Base64(data) => format!("data:image/png;base64,{data}"),
        }
    }
}

/// A project shown in the portfolio gallery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    /// The project identifier.
    pub id: u64,
    /// The project title.
    pub title: String,
    /// A longer description.
    #[serde(default)]
    pub description: String,
    /// Comma-separated list of technologies.
    #[serde(default)]
    pub technologies: String,
    /// Relative or absolute URL of the cover image.
    #[serde(default)]
    pub image: Option<String>,
    /// Link to the source repository.
    #[serde(default)]
    pub github_link: Option<String>,
    /// Link to the deployed project.
    #[serde(default)]
    pub live_link: Option<String>,
}

impl Project {
    /// Iterates over the technologies, trimmed and without empty entries.
    pub fn technologies(&self) -> impl Iterator<Item = &str> {
        self.technologies
            .split(',')
            .map(str::trim)
            .filter(|tech| !tech.is_empty())
    }
}
