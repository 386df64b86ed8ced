//! HTTP surface: EPUB upload, chapter retrieval, and streamed answers over SSE.

mod error;
mod handlers;
mod router;
mod server;
mod session;
pub mod upload;

pub use error::GatewayError;
pub use router::build_router;
pub use server::{AppState, GatewayServer};
pub use session::DEFAULT_COOKIE_NAME;
