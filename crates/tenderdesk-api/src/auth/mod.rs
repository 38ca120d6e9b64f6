//! Bearer-token authentication for the versioned API.

pub mod middleware;

pub use middleware::{auth_middleware, AuthState};
