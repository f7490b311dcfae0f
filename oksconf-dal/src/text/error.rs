use std::fmt::Display;

use camino::{Utf8Path, Utf8PathBuf};

/// A detailed error for an issue encountered during parsing
///
/// Errors chain from the outermost context to the innermost cause. Each one renders with its
/// location and the offending line:
///
/// ```text
/// error: Expected a reference
///  --> /db/widgets.data.oks:4:13
///   |
/// 4 |     next -> w2
///   |             ^
/// ```
#[derive(Debug, PartialEq)]
pub struct ParseError<'a> {
    error: String,
    text: &'a str,
    span: &'a str,
    path: Option<Utf8PathBuf>,
    next: Option<Box<ParseError<'a>>>,
}

impl Display for ParseError<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (index, error) in self.into_iter().enumerate() {
            let label = if index == 0 { "error" } else { "caused by" };
            error.fmt_one(f, label)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError<'_> {}

impl<'a> ParseError<'a> {
    /// Constructs a detailed error for an issue encountered during parsing
    ///
    /// The `span` must be a slice of `text`.
    pub fn new(
        error: String,
        text: &'a str,
        span: &'a str,
        next: Option<Box<ParseError<'a>>>,
    ) -> ParseError<'a> {
        ParseError {
            error,
            text,
            span,
            path: None,
            next,
        }
    }

    /// Names the file the text was read from, for this error and every error it chains to
    pub fn with_path(mut self, path: impl AsRef<Utf8Path>) -> ParseError<'a> {
        let path = path.as_ref();
        self.next = self.next.map(|next| Box::new(next.with_path(path)));
        self.path = Some(path.to_owned());
        self
    }

    /// The message of the outermost error
    pub fn message(&self) -> &str {
        &self.error
    }

    /// The file the text was read from, if known
    pub fn path(&self) -> Option<&Utf8Path> {
        self.path.as_deref()
    }

    /// Returns the calculated line number of the span within the text
    pub fn line_number(&self) -> usize {
        self.text[..self.offset()]
            .chars()
            .filter(|&c| c == '\n')
            .count()
            + 1
    }

    /// Returns the column (in characters, from 1) of the start of the span within its line
    pub fn column_number(&self) -> usize {
        self.text[self.line_start()..self.offset()].chars().count() + 1
    }

    fn offset(&self) -> usize {
        (self.span.as_ptr() as usize).saturating_sub(self.text.as_ptr() as usize)
    }

    fn line_start(&self) -> usize {
        self.text[..self.offset()]
            .rfind('\n')
            .map_or(0, |newline| newline + 1)
    }

    fn fmt_one(&self, f: &mut std::fmt::Formatter<'_>, label: &str) -> std::fmt::Result {
        let (lineno, column) = (self.line_number(), self.column_number());
        let line = self.text[self.line_start()..]
            .lines()
            .next()
            .unwrap_or_default();
        let gutter = " ".repeat(lineno.to_string().len());
        writeln!(f, "{label}: {}", self.error)?;
        match &self.path {
            Some(path) => writeln!(f, "{gutter}--> {path}:{lineno}:{column}")?,
            None => writeln!(f, "{gutter}--> line {lineno}, column {column}")?,
        }
        writeln!(f, "{gutter} |")?;
        writeln!(f, "{lineno} | {line}")?;
        writeln!(f, "{gutter} | {:1$}^", "", column - 1)
    }
}

impl<'a, 'b> IntoIterator for &'b ParseError<'a> {
    type IntoIter = ParseErrorIter<'a, 'b>;
    type Item = &'b ParseError<'a>;

    fn into_iter(self) -> Self::IntoIter {
        ParseErrorIter { err: Some(self) }
    }
}

/// Iterates over a chain of errors, outermost first
pub struct ParseErrorIter<'a, 'b> {
    err: Option<&'b ParseError<'a>>,
}

impl<'a, 'b> Iterator for ParseErrorIter<'a, 'b> {
    type Item = &'b ParseError<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.err;
        if let Some(err) = cur {
            self.err = err.next.as_deref();
        }
        cur
    }
}
