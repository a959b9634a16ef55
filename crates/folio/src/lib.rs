//! The portfolio client: a code-generation session with its conversation
//! list, the assistant panels and the project gallery, assembled over the
//! portfolio's REST backend.
//!
//! The crate includes a CLI tool for using it in the terminal. And you can
//! also use it as a library to drive the same session from another front end.

#![deny(missing_docs)]

#[allow(unused_imports)]
#[macro_use]
extern crate tracing;

mod app;
pub mod commands;
pub mod config;
pub mod render;

pub use app::{App, AppBuilder};

/// Re-exports of [`folio_core`] crate.
pub mod core {
    pub use folio_core::*;
}

/// Re-exports of [`folio_api`] crate.
pub mod api {
    pub use folio_api::*;
}
