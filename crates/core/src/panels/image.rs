use std::sync::Mutex;

use folio_api::{ImageRequest, ImageResult};

use super::{Submission, lock};
use crate::backend_client::BackendClient;
use crate::guard::BusyGuard;
use crate::identity::Identity;

/// The outcome of an image generation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageOutcome {
    /// The generated image.
    Image(ImageResult),
    /// Why no image was generated.
    Failed(String),
}

/// The image generator.
pub struct ImagePanel {
    backend: BackendClient,
    identity: Identity,
    guard: BusyGuard,
    last: Mutex<Option<ImageOutcome>>,
}

impl ImagePanel {
    /// Creates a panel with no image yet.
    #[inline]
    pub fn new(backend: BackendClient, identity: Identity) -> Self {
        Self {
            backend,
            identity,
            guard: BusyGuard::default(),
            last: Mutex::new(None),
        }
    }

    /// Generates an image for the prompt.
    pub async fn submit(&self, prompt: &str) -> Submission<ImageOutcome> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Submission::Ignored;
        }
        let Some(_permit) = self.guard.try_acquire() else {
            debug!("image generation is busy, ignoring prompt");
            return Submission::Ignored;
        };

        lock(&self.last).take();
        let credential = match self.identity.valid_credential() {
            Ok(credential) => credential,
            Err(err) => {
                let outcome = ImageOutcome::Failed(err.to_string());
                *lock(&self.last) = Some(outcome.clone());
                return Submission::Blocked(err.to_string());
            }
        };

        let request = ImageRequest {
            prompt: prompt.to_owned(),
        };
        let outcome = match self.backend.generate_image(request, credential).await
        {
            Ok(image) => ImageOutcome::Image(image),
            Err(err) => ImageOutcome::Failed(err.to_string()),
        };
        *lock(&self.last) = Some(outcome.clone());
        Submission::Completed(outcome)
    }

    /// Returns the outcome of the last submission.
    #[inline]
    pub fn last_outcome(&self) -> Option<ImageOutcome> {
        lock(&self.last).clone()
    }

    /// Returns whether an image is being generated.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }
}
