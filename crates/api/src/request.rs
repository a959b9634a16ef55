use serde::{Deserialize, Serialize};

use crate::ConversationId;

/// A message for the anonymous general-purpose chat.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user input.
    pub message: String,
}

/// An input for the gated AI model, which needs a CAPTCHA verification
/// token on top of the bearer credential.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GatedChatRequest {
    /// The user input.
    pub input: String,
    /// The token issued by the CAPTCHA service.
    pub recaptcha_token: String,
}

/// A prompt for the conversational code generator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodegenRequest {
    /// The user input.
    pub input: String,
    /// The conversation to continue. A new conversation is started by the
    /// backend when this is absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

/// A prompt for the image generator.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRequest {
    /// Description of the image to generate.
    pub prompt: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_codegen_request_body() {
        let fresh = CodegenRequest {
            input: "write a fibonacci function".to_owned(),
            conversation_id: None,
        };
        assert_eq!(
            serde_json::to_value(&fresh).unwrap(),
            json!({ "input": "write a fibonacci function" })
        );

        let continued = CodegenRequest {
            input: "now in rust".to_owned(),
            conversation_id: Some(ConversationId(7)),
        };
        assert_eq!(
            serde_json::to_value(&continued).unwrap(),
            json!({ "input": "now in rust", "conversation_id": 7 })
        );
    }
}
