//! Safety validation of generated code
//!
//! Candidate source is untrusted. It is checked textually against a denylist
//! before it may reach the filesystem or the build toolchain.

pub mod rules;
pub mod validator;

pub use rules::{RuleClass, SafetyRule};
pub use validator::{SOURCE_TOO_LARGE, SafetyValidator, SafetyViolation};
