//! Tenderdesk Database Library
//!
//! Repository traits for documents, extraction attempts and provider usage, with
//! PostgreSQL implementations and an in-memory store for tests and
//! database-less development.

pub mod db;
pub mod pool;

pub use db::document::PgDocumentRepository;
pub use db::extraction::PgExtractionRepository;
pub use db::memory::InMemoryStore;
pub use db::usage::PgUsageLogRepository;
pub use db::{ClaimResult, DocumentRepository, ExtractionRepository, UsageLogRepository};
pub use pool::{create_pool, run_migrations};
