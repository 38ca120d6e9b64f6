//! Tenderdesk HTTP API
//!
//! Axum router, handlers and application wiring. The binary in `main.rs` only
//! loads configuration and hands it to [`setup::initialize_app`].

mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;

pub use api_doc::ApiDoc;
pub use error::{ErrorResponse, HttpAppError};
pub use state::{AppState, Repositories};
