//! The Docket server core: request dispatch, the six opcode handlers, the
//! parallel keyword search, and the serving loop.
//!
//! The loop is the single owner of every piece of shared state (store,
//! cache, transport); workers receive an [`ServerContext`] clone and the
//! request payload, and hand back a finished response frame over a channel.

pub mod dispatch;
mod error;
pub mod handlers;
pub mod search;
pub mod server;

pub use error::ServerError;
pub use handlers::{Outcome, ServerContext};
pub use server::{Server, ServerConfig};
