//! Client-side logic of the portfolio: the code-generation session, the
//! response segmenter, the conversation list, credentials and storage.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod backend_client;
pub mod conversation_list;
mod guard;
pub mod identity;
pub mod panels;
pub mod segment;
mod session;
pub mod store;

pub use backend_client::BackendClient;
pub use guard::{BusyGuard, BusyPermit};
pub use identity::Identity;
pub use session::*;
