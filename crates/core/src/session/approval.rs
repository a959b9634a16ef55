use std::fmt::{self, Debug, Display};

use folio_api::ConversationId;

/// The question asked before a conversation is deleted.
pub const DELETE_PROMPT: &str =
    "Delete this conversation? This cannot be undone.";

/// A pending request to delete a conversation.
///
/// The deletion only goes ahead once [`approve`](Self::approve) is called.
/// Dropping the approval without deciding rejects it.
pub struct DeleteApproval {
    id: ConversationId,
    label: String,
    on_result: Option<Box<dyn FnOnce(bool) + Send>>,
}

impl DeleteApproval {
    pub(crate) fn new(
        id: ConversationId,
        label: String,
        on_result: impl FnOnce(bool) + Send + 'static,
    ) -> Self {
        Self {
            id,
            label,
            on_result: Some(Box::new(on_result)),
        }
    }

    /// Returns the conversation to be deleted.
    #[inline]
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// Returns the display label of the conversation.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Approves the deletion.
    #[inline]
    pub fn approve(mut self) {
        self.decide(true);
    }

    /// Rejects the deletion.
    #[inline]
    pub fn reject(mut self) {
        self.decide(false);
    }

    fn decide(&mut self, approved: bool) {
        let Some(on_result) = self.on_result.take() else {
            return;
        };
        on_result(approved);
    }
}

impl Drop for DeleteApproval {
    fn drop(&mut self) {
        self.decide(false);
    }
}

impl Debug for DeleteApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeleteApproval")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl Display for DeleteApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{DELETE_PROMPT} ({})", self.label)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recorded() -> (Arc<Mutex<Vec<bool>>>, impl FnOnce(bool) + Send + 'static)
    {
        let decisions = Arc::new(Mutex::new(vec![]));
        let sink = Arc::clone(&decisions);
        (decisions, move |approved| sink.lock().unwrap().push(approved))
    }

    #[test]
    fn test_decisions() {
        let (decisions, on_result) = recorded();
        let approval =
            DeleteApproval::new(ConversationId(7), "Conversation #7".into(), on_result);
        assert_eq!(approval.id(), ConversationId(7));
        assert!(approval.to_string().ends_with("(Conversation #7)"));
        approval.approve();
        assert_eq!(*decisions.lock().unwrap(), [true]);

        let (decisions, on_result) = recorded();
        DeleteApproval::new(ConversationId(7), String::new(), on_result).reject();
        assert_eq!(*decisions.lock().unwrap(), [false]);
    }

    #[test]
    fn test_dropped_means_rejected() {
        let (decisions, on_result) = recorded();
        drop(DeleteApproval::new(ConversationId(1), String::new(), on_result));
        assert_eq!(*decisions.lock().unwrap(), [false]);
    }
}
