/// What went wrong while reading an archive.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ErrorKind {
    /// The archive does not open with a `<=+>` boundary.
    MissingBoundary,
    /// A boundary was followed by something other than a space or a newline.
    UnexpectedAfterBoundary(char),
    /// A boundary and a space, but no path.
    MissingPath,
    /// A path that would escape the archive root or is otherwise unusable.
    InvalidPath { path: String, reason: &'static str },
    /// A directory entry (`path/`) carrying a body.
    DirectoryWithContents(String),
}

/// A parse failure and the 1-based line it was found on.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub kind: ErrorKind,
}

impl ParseError {
    pub fn new(line: usize, kind: ErrorKind) -> Self {
        Self { line, kind }
    }
}

impl std::error::Error for ParseError {}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "line {}: ", self.line)?;
        match &self.kind {
            ErrorKind::MissingBoundary => {
                write!(f, "archive must start with a boundary such as `<===>`")
            }
            ErrorKind::UnexpectedAfterBoundary(found) => {
                write!(f, "expected a space or a newline after the boundary, found {found:?}")
            }
            ErrorKind::MissingPath => write!(f, "entry header has no path"),
            ErrorKind::InvalidPath { path, reason } => {
                write!(f, "invalid path {path:?}: {reason}")
            }
            ErrorKind::DirectoryWithContents(path) => {
                write!(f, "directory entry {path:?} must not have contents")
            }
        }
    }
}
