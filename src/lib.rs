//! Ouroboros - a self-extending tool pipeline
//!
//! Detects when an agent is missing a tool, has a language model write one,
//! checks the untrusted source against a safety denylist, compiles it and
//! registers the artifact, keeping cumulative outcome statistics.

pub mod compiler;
pub mod config;
pub mod detection;
pub mod error;
pub mod llm;
pub mod ouroboros;
pub mod prompt;
pub mod registry;
pub mod safety;

pub use error::{OuroborosError, Result};
