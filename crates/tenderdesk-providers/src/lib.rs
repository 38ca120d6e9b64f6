//! Tenderdesk Providers Library
//!
//! Interchangeable AI providers behind one trait, and the fallback chain that
//! tries them in configured order.

pub mod anthropic;
pub mod chain;
pub mod factory;
pub mod gemini;
mod http;
pub mod openai;
pub mod prompt;
pub mod provider;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use chain::{ChainError, ChainOutcome, FallbackChain};
pub use factory::build_chain;
pub use provider::{
    AiProvider, ProviderCapabilities, ProviderError, ProviderInfo, ProviderInput,
    ProviderRequest, ProviderResponse,
};
