use std::sync::Arc;

use folio_api::Backend;

use super::SessionController;
use super::approval::DeleteApproval;
use super::state::DeleteRequestFn;
use crate::backend_client::BackendClient;
use crate::identity::Identity;
use crate::store::MemoryStore;

/// [`SessionController`] builder.
pub struct SessionBuilder {
    backend: BackendClient,
    identity: Option<Identity>,
    on_delete_request: Option<DeleteRequestFn>,
}

impl SessionBuilder {
    /// Creates a new builder with the specified backend.
    #[inline]
    pub fn with_backend<B: Backend>(backend: B) -> Self {
        Self::with_backend_client(BackendClient::new(backend))
    }

    /// Creates a new builder sharing an existing backend client.
    #[inline]
    pub fn with_backend_client(backend: BackendClient) -> Self {
        Self {
            backend,
            identity: None,
            on_delete_request: None,
        }
    }

    /// Uses the given identity, and the store it persists to.
    ///
    /// Without one, the controller starts signed out with an in-memory
    /// store.
    #[inline]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Attaches a callback that asks the user to confirm deletions.
    ///
    /// Without one, every deletion is refused.
    #[inline]
    pub fn on_delete_request(
        mut self,
        on_delete_request: impl Fn(DeleteApproval) + Send + Sync + 'static,
    ) -> Self {
        self.on_delete_request = Some(Box::new(on_delete_request));
        self
    }

    /// Builds the controller and starts its loop.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    #[inline]
    pub fn build(self) -> SessionController {
        let identity = match self.identity {
            Some(identity) => identity,
            None => Identity::rehydrate(Arc::new(MemoryStore::new())),
        };
        SessionController::spawn(self.backend, identity, self.on_delete_request)
    }
}
