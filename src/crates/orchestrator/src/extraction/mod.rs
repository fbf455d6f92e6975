//! Turning a winning response into a file set.
//!
//! Parsing here is best-effort: malformed fences or JSON degrade to empty
//! or default values and are logged, never surfaced as errors.

pub mod blocks;
pub mod deps;
pub mod normalize;
pub mod setup;
pub mod validate;

pub use blocks::{extract_code_blocks, CodeBlock};
pub use deps::{extract_dependencies, extract_env_vars};
pub use normalize::{extension_for, normalize_blocks};
pub use setup::extract_setup_instructions;
pub use validate::{validate_generated_code, ValidationWarning};
