//! Context layer: turning candidate paths into budgeted, segmented context.
//!
//! # Architecture
//!
//! - `loader` - Per-file reads; failures are recorded, never fatal
//! - `encoder` - Byte counts, token estimates, hashes
//! - `budget` - Per-file and total limits, exclusion/truncation
//! - `segmenter` - Greedy, order-preserving, never splits a file
//! - `prompt` - Rendering of segments for the assistant
//! - `pipeline` - The whole build as one cancellable unit

pub mod budget;
pub mod encoder;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod segmenter;

pub use budget::{BudgetEnforcer, BudgetOutcome};
pub use encoder::{estimate_tokens, BYTES_PER_TOKEN};
pub use loader::{load_all, FileLoader, LoadReport};
pub use pipeline::{ContextPipeline, PipelineOptions};
pub use prompt::compose_prompt;
pub use segmenter::segment;
