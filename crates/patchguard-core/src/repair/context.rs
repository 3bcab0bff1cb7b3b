//! Failure context accumulated across repair attempts.

use serde::{Deserialize, Serialize};

use patchguard_memory::MemoryRecord;

use crate::domain::{ContextNote, FailureClass, ValidationResult};

/// Characters of validator output kept in one note.
pub const ERROR_EXCERPT_CHARS: usize = 1_000;

/// Learnings recalled from memory when a session starts.
pub const RECALLED_LEARNINGS: usize = 5;

/// What the generator knows going into an attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairContext {
    /// Past learnings of the same category, oldest first.
    pub learnings: Vec<MemoryRecord>,
    /// One note per failed attempt so far, in order.
    pub notes: Vec<ContextNote>,
}

impl RepairContext {
    pub fn new(learnings: Vec<MemoryRecord>) -> Self {
        Self {
            learnings,
            notes: Vec::new(),
        }
    }

    pub fn push(&mut self, note: ContextNote) {
        self.notes.push(note);
    }

    pub fn is_empty(&self) -> bool {
        self.learnings.is_empty() && self.notes.is_empty()
    }

    /// Plain-text rendering for prompt-based generators.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if !self.learnings.is_empty() {
            out.push_str("Past learnings:\n");
            for record in &self.learnings {
                out.push_str(&format!("- [{}] {}\n", record.category, record.description));
                if let Some(solution) = &record.solution {
                    out.push_str(&format!("  solution: {}\n", first_line(solution)));
                }
            }
        }
        for note in &self.notes {
            out.push_str(&format!(
                "Attempt {} {} ({}):\n",
                note.attempt, note.outcome, note.failure_class
            ));
            if !note.failing_checks.is_empty() {
                out.push_str(&format!("  failing: {}\n", note.failing_checks.join(", ")));
            }
            if !note.error_excerpt.is_empty() {
                for line in note.error_excerpt.lines() {
                    out.push_str("  | ");
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        out
    }
}

/// Summarise a failed attempt.
pub fn note_for(attempt: u32, result: &ValidationResult, class: FailureClass) -> ContextNote {
    ContextNote {
        attempt,
        outcome: result.outcome,
        failing_checks: result.failing_checks().map(|c| c.name.clone()).collect(),
        error_excerpt: error_excerpt(result, ERROR_EXCERPT_CHARS),
        failure_class: class,
    }
}

/// The first line mentioning an error or failure plus the line after it;
/// the output tail when no such line exists. Bounded to `max_chars`.
pub fn error_excerpt(result: &ValidationResult, max_chars: usize) -> String {
    let output = result.combined_output();
    let lines: Vec<&str> = output.lines().collect();

    let excerpt = match lines
        .iter()
        .position(|l| l.contains("Error") || l.contains("FAILED") || l.contains("panicked"))
    {
        Some(i) => lines[i..lines.len().min(i + 2)]
            .iter()
            .map(|l| l.trim())
            .collect::<Vec<_>>()
            .join("\n"),
        None => tail_chars(output.trim(), max_chars).to_string(),
    };
    truncate_chars(&excerpt, max_chars)
}

/// Keep at most `max_chars` characters from the start of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

fn tail_chars(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    match s.char_indices().nth(skip) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
