//! The simpler panels that talk to the backend: general chat, gated chat,
//! image generation, and the project gallery.
//!
//! Unlike the code-generation session, panels are driven directly: each
//! submission is awaited by the caller and at most one runs at a time.

mod chat;
mod gallery;
mod gated;
mod image;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use chat::{ChatPanel, NO_CLEAR_RESPONSE};
pub use gallery::Gallery;
pub use gated::{CAPTCHA_REQUIRED, GatedChatPanel, NO_RESPONSE};
pub use image::{ImageOutcome, ImagePanel};

/// The outcome of submitting something to a panel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Submission<T> {
    /// The input was blank, or another submission is still running.
    Ignored,
    /// A precondition is not met, nothing was sent.
    Blocked(String),
    /// The request went through, successfully or not.
    Completed(T),
}

impl<T> Submission<T> {
    /// Returns the completed value, if any.
    #[inline]
    pub fn completed(self) -> Option<T> {
        match self {
            Submission::Completed(value) => Some(value),
            _ => None,
        }
    }
}

#[inline]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
