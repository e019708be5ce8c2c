//! Parse error collection and reporting.

use std::fmt;

use cel_core_common::{SourceInfo, Span};

/// Number of errors kept for reporting; later ones are only counted.
pub const MAX_STORED_ERRORS: usize = 100;

/// A parse error with an optional source location.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
    pub span: Option<Span>,
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span: Some(span),
        }
    }

    /// An error that is not tied to a location in the source.
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: None,
        }
    }

    /// Sort key: unpositioned errors order after every positioned one.
    fn sort_key(&self) -> (usize, usize) {
        match &self.span {
            Some(span) => (span.start, span.end),
            None => (usize::MAX, usize::MAX),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.span {
            Some(span) => write!(f, "{} at {}..{}", self.message, span.start, span.end),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ParseError {}

/// Errors collected while parsing one expression.
///
/// Stores at most [`MAX_STORED_ERRORS`] errors but counts all of them, so a
/// report can say how many were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseErrors {
    errors: Vec<ParseError>,
    total: usize,
}

impl ParseErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ParseError) {
        self.total += 1;
        if self.errors.len() < MAX_STORED_ERRORS {
            self.errors.push(error);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of stored errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Number of errors reported, including the ones not stored.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of errors counted but not stored.
    pub fn truncated(&self) -> usize {
        self.total - self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.errors.iter()
    }

    /// Stored errors in display order: by start then end offset, with
    /// unpositioned errors last. Ties keep the order they were reported in.
    pub fn sorted(&self) -> Vec<&ParseError> {
        let mut sorted: Vec<&ParseError> = self.errors.iter().collect();
        sorted.sort_by_key(|e| e.sort_key());
        sorted
    }

    /// Render every error with its location and a caret snippet.
    ///
    /// ```text
    /// ERROR: <input>:1:4: Syntax error: unexpected end of input
    ///  | 1 +
    ///  | ...^
    /// ```
    pub fn report(&self, info: &SourceInfo) -> String {
        let mut lines = Vec::with_capacity(self.errors.len() * 3 + 1);
        for error in self.sorted() {
            let Some(span) = &error.span else {
                lines.push(format!("ERROR: {}: {}", info.description(), error.message));
                continue;
            };
            let (line, column) = info.location(span.start);
            lines.push(format!(
                "ERROR: {}:{}:{}: {}",
                info.description(),
                line,
                column,
                error.message
            ));
            if let Some(text) = info.line_text(line) {
                lines.push(format!(" | {}", text));
                lines.push(format!(" | {}^", ".".repeat(column - 1)));
            }
        }
        if self.truncated() > 0 {
            lines.push(format!("{} more errors were truncated", self.truncated()));
        }
        lines.join("\n")
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.sorted().iter().map(|e| e.to_string()).collect();
        write!(f, "{}", messages.join("; "))?;
        if self.truncated() > 0 {
            write!(f, "; {} more errors were truncated", self.truncated())?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}

impl<'a> IntoIterator for &'a ParseErrors {
    type Item = &'a ParseError;
    type IntoIter = std::slice::Iter<'a, ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cap_counts_dropped_errors() {
        let mut errors = ParseErrors::new();
        for i in 0..105 {
            errors.push(ParseError::new(format!("e{}", i), i..i + 1));
        }
        assert_eq!(errors.len(), MAX_STORED_ERRORS);
        assert_eq!(errors.total(), 105);
        assert_eq!(errors.truncated(), 5);

        let info = SourceInfo::new("<input>", "x");
        let report = errors.report(&info);
        assert!(report.ends_with("5 more errors were truncated"), "{}", report);
    }

    #[test]
    fn sorted_by_position_with_unpositioned_last() {
        let mut errors = ParseErrors::new();
        errors.push(ParseError::unpositioned("late"));
        errors.push(ParseError::new("second", 4..5));
        errors.push(ParseError::new("first", 1..2));
        errors.push(ParseError::new("also second", 4..5));
        let order: Vec<&str> = errors.sorted().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "also second", "late"]);
    }

    #[test]
    fn report_has_location_and_caret() {
        let mut errors = ParseErrors::new();
        errors.push(ParseError::new("Syntax error: oops", 4..5));
        let info = SourceInfo::new("<input>", "a &&\n  b c");
        assert_eq!(
            errors.report(&info),
            "ERROR: <input>:1:5: Syntax error: oops\n | a &&\n | ....^"
        );
    }

    #[test]
    fn report_on_second_line() {
        let mut errors = ParseErrors::new();
        errors.push(ParseError::new("bad", 9..10));
        let info = SourceInfo::new("expr.cel", "a &&\n  b c");
        assert_eq!(
            errors.report(&info),
            "ERROR: expr.cel:2:5: bad\n |   b c\n | ....^"
        );
    }
}
