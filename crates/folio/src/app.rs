use std::sync::Arc;

use folio_api::{Backend, Credential};
use folio_core::identity::SignInRequired;
use folio_core::panels::{ChatPanel, Gallery, GatedChatPanel, ImagePanel};
use folio_core::store::{MemoryStore, Store};
use folio_core::{
    BackendClient, DeleteApproval, Identity, SessionBuilder, SessionController,
};
use folio_http::{HttpBackend, HttpConfig};

type DeleteRequestFn = Box<dyn Fn(DeleteApproval) + Send + Sync>;

/// An [`App`] builder.
pub struct AppBuilder {
    backend: BackendClient,
    store: Option<Arc<dyn Store>>,
    on_delete_request: Option<DeleteRequestFn>,
}

impl AppBuilder {
    /// Creates a builder talking to the given backend.
    #[inline]
    pub fn with_backend<B: Backend>(backend: B) -> Self {
        Self {
            backend: BackendClient::new(backend),
            store: None,
            on_delete_request: None,
        }
    }

    /// Creates a builder talking to the portfolio backend over HTTP.
    #[inline]
    pub fn with_http_config(config: HttpConfig) -> Self {
        Self::with_backend(HttpBackend::new(config))
    }

    /// Sets the store the credential and the active conversation are
    /// persisted to.
    #[inline]
    pub fn with_store<S: Store>(self, store: S) -> Self {
        self.with_shared_store(Arc::new(store))
    }

    /// Like [`with_store`](Self::with_store), for a store shared with
    /// something else.
    #[inline]
    pub fn with_shared_store(mut self, store: Arc<dyn Store>) -> Self {
        self.store = Some(store);
        self
    }

    /// Attaches a callback that asks the user to confirm deletions.
    #[inline]
    pub fn on_delete_request(
        mut self,
        on_delete_request: impl Fn(DeleteApproval) + Send + Sync + 'static,
    ) -> Self {
        self.on_delete_request = Some(Box::new(on_delete_request));
        self
    }

    /// Builds the app and starts its code-generation session.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn build(self) -> App {
        let store: Arc<dyn Store> = match self.store {
            Some(store) => store,
            None => Arc::new(MemoryStore::new()),
        };
        let identity = Identity::rehydrate(store);

        let mut session_builder =
            SessionBuilder::with_backend_client(self.backend.clone())
                .with_identity(identity.clone());
        if let Some(on_delete_request) = self.on_delete_request {
            session_builder = session_builder.on_delete_request(on_delete_request);
        }

        App {
            session: session_builder.build(),
            chat: ChatPanel::new(self.backend.clone()),
            gated_chat: GatedChatPanel::new(
                self.backend.clone(),
                identity.clone(),
            ),
            image: ImagePanel::new(self.backend.clone(), identity.clone()),
            gallery: Gallery::new(self.backend),
            identity,
        }
    }
}

/// Everything the portfolio client offers, wired to one backend and one
/// signed-in user.
pub struct App {
    identity: Identity,
    session: SessionController,
    chat: ChatPanel,
    gated_chat: GatedChatPanel,
    image: ImagePanel,
    gallery: Gallery,
}

impl App {
    /// Returns the code-generation session.
    #[inline]
    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Returns the general assistant.
    #[inline]
    pub fn chat(&self) -> &ChatPanel {
        &self.chat
    }

    /// Returns the CAPTCHA-gated assistant.
    #[inline]
    pub fn gated_chat(&self) -> &GatedChatPanel {
        &self.gated_chat
    }

    /// Returns the image generator.
    #[inline]
    pub fn image(&self) -> &ImagePanel {
        &self.image
    }

    /// Returns the project gallery.
    #[inline]
    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    /// Returns whether a valid credential is present.
    #[inline]
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_signed_in()
    }

    /// Signs in with an ID token and lets the session pick it up.
    pub fn sign_in<S: Into<String>>(&self, token: S) -> Result<(), SignInRequired> {
        self.identity.sign_in(Credential::new(token))?;
        self.session.credential_changed();
        Ok(())
    }

    /// Signs out and lets the session drop what belonged to the user.
    pub fn sign_out(&self) {
        self.identity.sign_out();
        self.session.credential_changed();
    }
}

impl Drop for App {
    fn drop(&mut self) {
        self.session.shutdown();
    }
}
