//! Tenderdesk Storage Library
//!
//! Object storage abstraction for uploaded documents. The extraction core only
//! needs `put(key, bytes, mime) -> url` and `get(key)`; the local filesystem
//! backend implements both for development and tests.
//!
//! # Storage key format
//!
//! `documents/{module}/{uuid}-{sanitized filename}`. Keys must not contain `..` or a
//! leading `/`. Key generation lives in the `keys` module.

pub mod factory;
pub mod keys;
pub mod local;
pub mod traits;

pub use factory::create_storage;
pub use keys::generate_document_key;
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
