//! Tenderdesk Extraction Library
//!
//! Turns stored documents and uploaded archives into structured, review-routed
//! extraction results: the single-document pipeline, the persisted orchestrator
//! around it, batch processing and the confidence router.

pub mod batch;
pub mod orchestrator;
pub mod parser;
pub mod pipeline;
pub mod review;

pub use batch::BatchProcessor;
pub use orchestrator::{ExtractionOrchestrator, ExtractionOutcome};
pub use parser::{parse_output, ParsedOutput};
pub use pipeline::{ExtractionPipeline, PipelineInput, PipelineOutput};
pub use review::{route, DEFAULT_REVIEW_THRESHOLD};
