use std::fmt::{Display, Formatter, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-length span at a single position.
    pub fn point(line: usize, column: usize) -> Self {
        let pos = Position::new(line, column);
        Self::new(pos, pos)
    }
}

impl Default for Span {
    fn default() -> Self {
        // A harmless 1:1 zero-length span instead of line 0.
        Self::point(1, 1)
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// One rendered row of a snippet: a numbered source line, or an unnumbered
/// marker row underlining part of the source line above it.
enum SnippetRow<'a> {
    Source { line_no: usize, text: &'a str },
    Marker { indent: usize, len: usize, caret: bool },
}

/// Underline geometry for `line_no`, when it falls inside the span: the
/// column range the span covers on that line, as a caret for a
/// single-character single-line span and dashes otherwise.
fn underline<'a>(
    line_no: usize,
    text: &'a str,
    span: Span,
    single_line: bool,
) -> Option<SnippetRow<'a>> {
    if line_no < span.start.line || line_no > span.end.line {
        return None;
    }
    let from = if line_no == span.start.line {
        span.start.column.max(1)
    } else {
        1
    };
    let to = if line_no == span.end.line {
        span.end.column.max(from)
    } else {
        text.chars().count() + 1
    };
    if to <= from {
        return None;
    }
    let len = to - from;
    Some(SnippetRow::Marker {
        indent: from - 1,
        len,
        caret: single_line && len == 1,
    })
}

/// Formats a warning message with a source snippet and marker rows
/// highlighting the span. Shows one line of context before and after.
///
/// Example:
/// ```text
/// (2:16) warning: access of uninitialized value `y`
/// │ 1 │ class A {
/// │ 2 │   val x: Int = y
/// │   │                ^
/// │ 3 │   val y: Int = 1
/// ```
pub fn format_warning(source: &str, span: Span, message: impl Display) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let span_first = span.start.line.max(1);
    let span_last = span.end.line.max(span_first);
    let single_line = span_first == span_last;

    // Collect the rows first, then render them against a fixed-width gutter.
    let context_from = span_first.saturating_sub(1).max(1);
    let context_to = (span_last + 1).min(lines.len().max(span_first));
    let mut rows = Vec::new();
    for line_no in context_from..=context_to {
        let text = lines.get(line_no - 1).copied().unwrap_or("");
        rows.push(SnippetRow::Source { line_no, text });
        rows.extend(underline(line_no, text, span, single_line));
    }

    let gutter = context_to.to_string().len();
    let mut out = format!(
        "({}:{}) warning: {message}\n",
        span.start.line, span.start.column
    );
    for row in rows {
        match row {
            SnippetRow::Source { line_no, text } => {
                out.push_str(&format!("│ {line_no:>gutter$} │ {text}\n"));
            }
            SnippetRow::Marker { indent, len, caret } => {
                let glyphs = if caret { "^".to_string() } else { "-".repeat(len) };
                let pad = " ".repeat(indent);
                out.push_str(&format!("│ {:>gutter$} │ {pad}{glyphs}\n", ""));
            }
        }
    }
    out
}
