//! Data models for the application
//!
//! Documents, extractions and batch results shared by every crate.

mod batch;
mod document;
mod extraction;

pub use batch::*;
pub use document::*;
pub use extraction::*;
