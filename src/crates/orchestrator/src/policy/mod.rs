//! Tiered content policy.
//!
//! Each subscription tier maps to a [`PolicyProfile`]. The gate runs a
//! [`ContentScanner`] over generated code and turns the scan into an
//! allow/warn/block decision plus incentive credits. A policy violation is
//! a decision, not an error.

pub mod gate;
pub mod profile;
pub mod scanner;

pub use gate::{EnforcementResult, PolicyGate};
pub use profile::{PolicyConfig, PolicyMode, PolicyProfile, ProfileOverride};
pub use scanner::{ContentScanner, MarkerScanner, ScanFinding, ScanResult};
