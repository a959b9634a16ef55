use folio_api::Project;

use crate::backend_client::BackendClient;

/// The project gallery.
#[derive(Clone)]
pub struct Gallery {
    backend: BackendClient,
}

impl Gallery {
    /// Creates the gallery.
    #[inline]
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Fetches the projects, or the message to show instead.
    pub async fn load(&self) -> Result<Vec<Project>, String> {
        self.backend.list_projects().await.map_err(|err| {
            warn!("failed to load projects: {err}");
            err.to_string()
        })
    }
}
