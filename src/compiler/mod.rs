//! Turning candidate source into loadable artifacts

mod adapter;
mod mock;
mod process_group;
mod toolchain;

pub use adapter::{CompileOutcome, CompilerAdapter};
pub use mock::MockToolchain;
pub use toolchain::{BuildReport, CommandToolchain, Toolchain};
