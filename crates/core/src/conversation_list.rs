//! Cached list of the conversations owned by the signed-in user.

use folio_api::{Conversation, ConversationId};

/// The client-side copy of the conversation list.
///
/// The list is possibly stale: it is replaced wholesale by a refresh, and
/// patched locally when the client creates or deletes a conversation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationList {
    items: Vec<Conversation>,
    loading: bool,
    error: Option<String>,
}

impl ConversationList {
    /// Returns the cached conversations, most recent first as the backend
    /// lists them.
    #[inline]
    pub fn items(&self) -> &[Conversation] {
        &self.items
    }

    /// Returns whether a refresh is in flight.
    #[inline]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns the error of the last failed list operation, if any.
    #[inline]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Looks up a cached conversation.
    #[inline]
    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.items.iter().find(|c| c.id == id)
    }

    /// Returns whether the conversation is in the list.
    #[inline]
    pub fn contains(&self, id: ConversationId) -> bool {
        self.get(id).is_some()
    }

    /// Marks a refresh as started, clearing the previous error.
    pub(crate) fn begin_refresh(&mut self) {
        self.loading = true;
        self.error = None;
    }

    /// Applies the outcome of a refresh.
    ///
    /// A failed refresh keeps the last-known list.
    pub(crate) fn finish_refresh(
        &mut self,
        result: Result<Vec<Conversation>, String>,
    ) {
        self.loading = false;
        match result {
            Ok(items) => {
                self.items = items;
                self.error = None;
            }
            Err(message) => self.error = Some(message),
        }
    }

    /// Puts a freshly created conversation at the top.
    pub(crate) fn prepend(&mut self, conversation: Conversation) {
        self.items.retain(|c| c.id != conversation.id);
        self.items.insert(0, conversation);
    }

    /// Drops a deleted conversation, returning whether it was cached.
    pub(crate) fn remove(&mut self, id: ConversationId) -> bool {
        let len = self.items.len();
        self.items.retain(|c| c.id != id);
        self.items.len() != len
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error = Some(message);
    }
}
