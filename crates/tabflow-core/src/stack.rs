//! Call-stack metadata recorded by the planner for each operator node.
//!
//! The runtime only uses it for diagnostics: when an operator fails, the
//! error is annotated with the script location that created the operator.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub file: String,
    pub start: Position,
    pub end: Position,
}

impl Location {
    pub fn new(file: impl Into<String>, start: Position, end: Position) -> Self {
        Self {
            file: file.into(),
            start,
            end,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.file.is_empty() {
            write!(f, "{}|", self.file)?;
        }
        write!(
            f,
            "{}:{}-{}:{}",
            self.start.line, self.start.column, self.end.line, self.end.column
        )
    }
}

/// One frame: the function called and where the call happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEntry {
    pub function_name: String,
    pub location: Location,
}

impl StackEntry {
    pub fn new(function_name: impl Into<String>, location: Location) -> Self {
        Self {
            function_name: function_name.into(),
            location,
        }
    }
}

/// Human-readable provenance for an operator, or `None` without a stack.
///
/// `stack[0]` is the innermost frame. The primary script is the file of the
/// outermost frame; we report the innermost frame that belongs to it so the
/// location points at the user's own code rather than a library function.
pub fn format_source_info(stack: &[StackEntry]) -> Option<String> {
    let outermost = stack.last()?;
    let primary = &outermost.location.file;
    let entry = stack
        .iter()
        .find(|e| &e.location.file == primary)
        .unwrap_or(outermost);
    Some(format!("@{}: {}", entry.location, entry.function_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(func: &str, file: &str, line: u32) -> StackEntry {
        StackEntry::new(
            func,
            Location::new(file, Position::new(line, 1), Position::new(line, 20)),
        )
    }

    #[test]
    fn empty_stack_has_no_source_info() {
        assert_eq!(format_source_info(&[]), None);
    }

    #[test]
    fn picks_innermost_frame_of_primary_file() {
        let stack = vec![
            entry("fill", "stdlib.tf", 300),
            entry("cleanup", "main.tf", 12),
            entry("main", "main.tf", 40),
        ];
        assert_eq!(
            format_source_info(&stack).as_deref(),
            Some("@main.tf|12:1-12:20: cleanup")
        );
    }

    #[test]
    fn location_without_file_omits_separator() {
        let loc = Location::new("", Position::new(3, 5), Position::new(3, 9));
        assert_eq!(loc.to_string(), "3:5-3:9");
        let stack = vec![StackEntry::new("dedup", loc)];
        assert_eq!(
            format_source_info(&stack).as_deref(),
            Some("@3:5-3:9: dedup")
        );
    }
}
