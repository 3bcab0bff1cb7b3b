//! Failure taxonomy for failed validations.

use crate::domain::{FailureClass, ValidationOutcome, ValidationResult};

/// Classify a validation that did not pass.
///
/// Checks run in priority order over the combined output; the first match
/// wins. A passing result classifies as [`FailureClass::Unknown`].
pub fn classify_failure(result: &ValidationResult) -> FailureClass {
    if result.timed_out {
        return FailureClass::Timeout;
    }

    let output = result.combined_output();
    let lower = output.to_lowercase();

    if output.contains("AssertionError")
        || lower.contains("assertion failed")
        || lower.contains("assertion `left == right` failed")
    {
        return FailureClass::Assertion;
    }
    if output.contains("AttributeError")
        || lower.contains("has no attribute")
        || lower.contains("no method named")
        || lower.contains("no field")
    {
        return FailureClass::Attribute;
    }
    if output.contains("TypeError") || lower.contains("mismatched types") {
        return FailureClass::Type;
    }
    if output.contains("ValueError") || lower.contains("invalid digit") {
        return FailureClass::Value;
    }
    if output.contains("ImportError")
        || output.contains("ModuleNotFoundError")
        || lower.contains("unresolved import")
        || lower.contains("can't find crate")
    {
        return FailureClass::Import;
    }
    if result.outcome == ValidationOutcome::Error
        || lower.contains("panicked at")
        || lower.contains("segmentation fault")
        || output.contains("RuntimeError")
        || output.contains("Traceback")
    {
        return FailureClass::Runtime;
    }

    FailureClass::Unknown
}
