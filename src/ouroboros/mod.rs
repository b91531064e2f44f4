//! The generation loop
//!
//! - Ouroboros: safety check, compile and register a candidate tool, keeping cumulative stats
//! - ToolSynthesizer: asks the model for source implementing a ToolNeed and drives it through the loop

pub mod outcome;
pub mod pipeline;
pub mod stats;
pub mod synthesizer;

pub use outcome::{
    COMPILATION_FAILURE_PREFIX, FailureKind, GenerationOutcome, GenerationRequest, SAFETY_FAILURE_PREFIX, ToolMetadata,
};
pub use pipeline::Ouroboros;
pub use stats::{LoopStats, LoopStatsSnapshot, Terminal};
pub use synthesizer::{ToolSynthesizer, extract_source};
