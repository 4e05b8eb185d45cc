//! Medex Extractor
//!
//! Converts free-text medicine/material descriptions into structured records
//! using a schema-constrained LLM completion per item.
//!
//! # Architecture
//!
//! ```text
//! ExtractionRequest → BatchOrchestrator → N × ItemExtractor → CompletionGateway
//!                                 ↓
//!                            BatchResult (outcomes in input order + token totals)
//! ```
//!
//! # Key Features
//!
//! - **Schema binding**: every call carries the `med_item` JSON Schema
//! - **Failure isolation**: one bad item never affects its siblings
//! - **Order preservation**: `outcomes[i]` always answers `items[i]`
//! - **Bounded fan-out**: at most `max_concurrency` calls in flight
//! - **Usage accounting**: token totals summed over successful items
//!
//! # Example Usage
//!
//! ```no_run
//! use medex_extractor::{BatchOrchestrator, ExtractionRequest, ExtractorConfig};
//! use medex_llm::MockGateway;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let gateway = MockGateway::new(r#"{"name": "Dipirona"}"#);
//! let orchestrator = BatchOrchestrator::new(gateway, ExtractorConfig::default())?;
//!
//! let result = orchestrator
//!     .run(ExtractionRequest::new(["Dipirona 500mg", "Soro fisiológico 0,9% 500ML"]))
//!     .await?;
//!
//! println!("Succeeded: {}", result.succeeded());
//! println!("Input tokens: {}", result.total_usage.input_tokens);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod extractor;
mod orchestrator;
mod parser;
mod prompt;
pub mod schema;
mod types;

#[cfg(test)]
mod tests;

pub use config::ExtractorConfig;
pub use error::{ExtractorError, FailureKind};
pub use extractor::ItemExtractor;
pub use orchestrator::BatchOrchestrator;
pub use parser::parse_record;
pub use types::{BatchResult, ExtractedRecord, ExtractionRequest, ItemOutcome};
