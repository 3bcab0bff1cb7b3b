//! Best-effort extraction of per-test results from validator output.
//!
//! Recognised formats:
//! - pytest verbose: `tests/test_app.py::test_status PASSED`
//! - pytest summary: `FAILED tests/test_app.py::test_status - AssertionError`
//! - cargo test: `test handlers::status ... ok`
//! - TAP: `ok 1 - status`, `not ok 2 - login`
//!
//! Skipped and ignored tests are left out. Each name appears once, in the
//! order first seen; a failure anywhere wins over a pass.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use patchguard_core::SubCheck;

const PYTEST_VERBOSE: &str =
    r"^(?P<name>\S+::\S+)\s+(?P<status>PASSED|FAILED|ERROR|SKIPPED|XFAIL|XPASS)\b";
const PYTEST_SUMMARY: &str = r"^(?P<status>FAILED|ERROR)\s+(?P<name>\S+::\S+)";
const CARGO_TEST: &str = r"^test (?P<name>\S+) \.\.\. (?P<status>ok|FAILED|ignored)\b";
const TAP: &str =
    r"^(?P<not>not )?ok\s+\d+(?:\s+-)?\s*(?P<name>[^#]*?)\s*(?:#\s*(?P<directive>.*))?$";

struct Patterns {
    pytest_verbose: Option<Regex>,
    pytest_summary: Option<Regex>,
    cargo_test: Option<Regex>,
    tap: Option<Regex>,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        pytest_verbose: Regex::new(PYTEST_VERBOSE).ok(),
        pytest_summary: Regex::new(PYTEST_SUMMARY).ok(),
        cargo_test: Regex::new(CARGO_TEST).ok(),
        tap: Regex::new(TAP).ok(),
    })
}

/// Parse every recognised marker in `output`.
pub fn parse_sub_checks(output: &str) -> Vec<SubCheck> {
    let mut checks: Vec<SubCheck> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for line in output.lines() {
        let line = line.trim_end();
        if let Some((name, passed)) = parse_line(line) {
            match index.get(&name) {
                Some(&i) => checks[i].passed &= passed,
                None => {
                    index.insert(name.clone(), checks.len());
                    checks.push(SubCheck { name, passed });
                }
            }
        }
    }
    checks
}

fn parse_line(line: &str) -> Option<(String, bool)> {
    let p = patterns();
    if let Some(caps) = p.pytest_verbose.as_ref().and_then(|re| re.captures(line)) {
        let passed = match &caps["status"] {
            "PASSED" | "XFAIL" => true,
            "FAILED" | "ERROR" | "XPASS" => false,
            _ => return None,
        };
        return Some((caps["name"].to_string(), passed));
    }
    if let Some(caps) = p.pytest_summary.as_ref().and_then(|re| re.captures(line)) {
        return Some((caps["name"].to_string(), false));
    }
    if let Some(caps) = p.cargo_test.as_ref().and_then(|re| re.captures(line)) {
        let passed = match &caps["status"] {
            "ok" => true,
            "FAILED" => false,
            _ => return None,
        };
        return Some((caps["name"].to_string(), passed));
    }
    if let Some(caps) = p.tap.as_ref().and_then(|re| re.captures(line)) {
        let directive = caps.name("directive").map(|m| m.as_str().to_uppercase());
        if directive.is_some_and(|d| d.starts_with("SKIP") || d.starts_with("TODO")) {
            return None;
        }
        let name = caps["name"].trim();
        if name.is_empty() {
            return None;
        }
        return Some((name.to_string(), caps.name("not").is_none()));
    }
    None
}
