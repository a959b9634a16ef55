//! The protocol spoken between the portfolio client and its backend.
//!
//! This crate describes the backend as a set of typed operations, so that
//! the session logic can run against the real HTTP service or against a
//! scripted fake without knowing which one it is talking to.
//!
//! Types in this crate don't define any behavior beyond parsing and
//! validating what the backend sends back. Implementors of [`Backend`]
//! live in their own crates.

#![deny(missing_docs)]

mod backend;
mod credential;
mod error;
mod request;
mod types;

pub use backend::*;
pub use credential::*;
pub use error::*;
pub use request::*;
pub use types::*;
