//! Source positions and the macro-call side table.

use std::collections::HashMap;

use crate::ast::SpannedExpr;

/// Description used when the caller does not name the source.
pub const DEFAULT_DESCRIPTION: &str = "<input>";

/// Position information for one parsed expression.
///
/// Maps expression ids to byte offsets and, when macro-call recording is on,
/// expansion ids to a copy of the call that produced them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SourceInfo {
    description: String,
    content: String,
    /// Byte offset at which each line starts. Always begins with `0`.
    line_offsets: Vec<usize>,
    positions: HashMap<i64, usize>,
    macro_calls: HashMap<i64, SpannedExpr>,
}

impl SourceInfo {
    pub fn new(description: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut line_offsets = vec![0];
        line_offsets.extend(
            content
                .char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            description: description.into(),
            content,
            line_offsets,
            positions: HashMap::new(),
            macro_calls: HashMap::new(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Convert a byte offset into a 1-based `(line, column)` pair.
    ///
    /// Columns count code points, not bytes.
    pub fn location(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.content.len());
        let line_index = self
            .line_offsets
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_offsets[line_index];
        let column = match self.content.get(line_start..offset) {
            Some(prefix) => prefix.chars().count(),
            None => offset - line_start,
        };
        (line_index + 1, column + 1)
    }

    /// Text of a 1-based line without its terminator.
    pub fn line_text(&self, line: usize) -> Option<&str> {
        let start = *self.line_offsets.get(line.checked_sub(1)?)?;
        let end = self
            .line_offsets
            .get(line)
            .map(|next| next - 1)
            .unwrap_or(self.content.len());
        self.content
            .get(start..end)
            .map(|text| text.strip_suffix('\r').unwrap_or(text))
    }

    pub fn positions(&self) -> &HashMap<i64, usize> {
        &self.positions
    }

    pub fn position(&self, id: i64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn record_position(&mut self, id: i64, offset: usize) {
        self.positions.insert(id, offset);
    }

    /// Forget the position of an id that no longer appears in the tree.
    pub fn retire_position(&mut self, id: i64) {
        self.positions.remove(&id);
    }

    pub fn macro_calls(&self) -> &HashMap<i64, SpannedExpr> {
        &self.macro_calls
    }

    pub fn macro_call(&self, id: i64) -> Option<&SpannedExpr> {
        self.macro_calls.get(&id)
    }

    pub fn add_macro_call(&mut self, expansion_id: i64, call: SpannedExpr) {
        self.macro_calls.insert(expansion_id, call);
    }
}
