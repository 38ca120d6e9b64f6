//! API versioning constants.

/// Current API version segment.
pub const API_VERSION: &str = "v1";

/// Prefix for every versioned route.
pub const API_PREFIX: &str = "/api/v1";
