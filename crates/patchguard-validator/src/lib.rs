//! PatchGuard Validator - run test commands as validation oracles
//!
//! Provides:
//! - `CommandValidator`: spawns the command, enforces its timeout, captures output
//! - marker parsing for pytest, cargo test and TAP output
//! - builtin suites that produce ready-made `ValidationCommand`s

pub mod markers;
pub mod runner;
pub mod suite;

pub use markers::parse_sub_checks;
pub use runner::{CommandValidator, TIMEOUT_MARKER};
pub use suite::{BuiltinSuite, SuiteConfig};
