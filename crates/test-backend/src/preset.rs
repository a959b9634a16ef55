use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use folio_api::{ConversationId, Credential, ErrorKind};

/// The operations of the backend, used to script failures and to inspect
/// what has been requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    ListProjects,
    Chat,
    GatedChat,
    GenerateCode,
    GenerateImage,
    CreateConversation,
    ListConversations,
    ConversationHistory,
    DeleteConversation,
}

/// A request as seen by the test backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedRequest {
    /// The requested operation.
    pub operation: Operation,
    /// The conversation the request referred to, if any.
    pub conversation_id: Option<ConversationId>,
    /// The user text carried by the request, if any.
    pub text: Option<String>,
}

/// A scripted failure for the next request of an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Failure {
    pub(crate) kind: ErrorKind,
    pub(crate) message: String,
    pub(crate) status: Option<u16>,
}

impl Failure {
    /// The backend answers with the given status and error message.
    #[inline]
    pub fn status<S: Into<String>>(status: u16, message: S) -> Self {
        let kind = match status {
            404 => ErrorKind::NotFound,
            401 | 403 => ErrorKind::Unauthorized,
            _ => ErrorKind::Status,
        };
        Self {
            kind,
            message: message.into(),
            status: Some(status),
        }
    }

    /// The backend cannot be reached at all.
    #[inline]
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self {
            kind: ErrorKind::Transport,
            message: message.into(),
            status: None,
        }
    }
}

/// Makes a credential that stays valid for the next hour.
pub fn valid_credential() -> Credential {
    let now = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
    Credential::new(make_id_token(now + 3600))
}

/// Makes a credential that expired long ago.
pub fn expired_credential() -> Credential {
    Credential::new(make_id_token(1))
}

fn make_id_token(exp: u64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(format!(r#"{{"sub":"tester","exp":{exp}}}"#).as_bytes());
    format!("{header}.{payload}.test")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials() {
        assert!(!valid_credential().is_expired());
        assert!(expired_credential().is_expired());
        assert_eq!(expired_credential().expires_at(), Some(1));
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(Failure::status(404, "gone").kind, ErrorKind::NotFound);
        assert_eq!(Failure::status(500, "boom").kind, ErrorKind::Status);
        assert_eq!(Failure::transport("offline").status, None);
    }
}
