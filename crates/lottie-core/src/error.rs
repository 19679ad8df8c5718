use serde_json::error::Category;
use std::io;

/// Coarse classification of a [`ParseError`], for callers that only need to branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    SourceUnavailable,
    MalformedSyntax,
    InvalidField,
}

/// Why a composition could not be produced.
///
/// Every variant is fatal to the parse that raised it; no partial composition
/// is ever returned. Unsupported-but-readable content is reported through
/// [`Composition::warnings`](crate::Composition::warnings) instead.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The byte source could not be opened or read, or ended early.
    #[error("animation source unavailable: {0}")]
    SourceUnavailable(#[from] io::Error),
    /// The token stream is not valid JSON.
    #[error("malformed animation data: {message}")]
    MalformedSyntax {
        message: String,
        line: usize,
        column: usize,
    },
    /// A required field is missing or a known field holds an unusable value.
    #[error("invalid animation field: {message}")]
    InvalidField {
        message: String,
        line: usize,
        column: usize,
    },
}

impl ParseError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::SourceUnavailable(_) => ErrorKind::SourceUnavailable,
            ParseError::MalformedSyntax { .. } => ErrorKind::MalformedSyntax,
            ParseError::InvalidField { .. } => ErrorKind::InvalidField,
        }
    }

    /// Line and column of the offending token, when the error came from the decoder.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            ParseError::SourceUnavailable(_) => None,
            ParseError::MalformedSyntax { line, column, .. }
            | ParseError::InvalidField { line, column, .. } => Some((*line, *column)),
        }
    }
}

impl From<serde_json::Error> for ParseError {
    fn from(err: serde_json::Error) -> Self {
        let (line, column) = (err.line(), err.column());
        match err.classify() {
            Category::Io => ParseError::SourceUnavailable(err.into()),
            // A stream that stops mid-document is a transport problem, not bad content.
            Category::Eof => {
                ParseError::SourceUnavailable(io::Error::new(io::ErrorKind::UnexpectedEof, err))
            }
            Category::Syntax => ParseError::MalformedSyntax {
                message: err.to_string(),
                line,
                column,
            },
            Category::Data => ParseError::InvalidField {
                message: err.to_string(),
                line,
                column,
            },
        }
    }
}

/// A known field whose value cannot be turned into the model.
///
/// Raised while converting decoded wire structs; the parser surfaces it as
/// [`ParseError::InvalidField`] with the decoder's position attached.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{0}")]
pub struct FieldError(pub String);

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        FieldError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_serde_errors() {
        let syntax = serde_json::from_str::<serde_json::Value>("{\"w\": }").unwrap_err();
        assert_eq!(ParseError::from(syntax).kind(), ErrorKind::MalformedSyntax);

        let eof = serde_json::from_str::<serde_json::Value>("{\"w\": 1").unwrap_err();
        assert_eq!(ParseError::from(eof).kind(), ErrorKind::SourceUnavailable);

        let data = serde_json::from_str::<u32>("\"wide\"").unwrap_err();
        let err = ParseError::from(data);
        assert_eq!(err.kind(), ErrorKind::InvalidField);
        assert!(err.position().is_some());
    }
}
