// Reader for the human-readable archive (HRX) format used to store spec fixtures.
use errors::{ErrorKind, ParseError};
pub mod errors;

/// A single record decoded from an archive.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Entry {
    /// `/`-separated path relative to the archive root, without a trailing slash.
    pub path: String,
    pub kind: EntryKind,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum EntryKind {
    File(String),
    Directory,
}

impl Entry {
    /// The path split into its segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/')
    }
}

/// Reads the boundary (`<` followed by one or more `=` and `>`) that opens the archive.
fn read_boundary(text: &str) -> Option<&str> {
    let rest = text.strip_prefix('<')?;
    let equals = rest.bytes().take_while(|byte| *byte == b'=').count();
    if equals == 0 || rest.as_bytes().get(equals) != Some(&b'>') {
        return None;
    }

    Some(&text[..equals + 2])
}

/// Byte offsets of every line that starts with `boundary`.
fn boundary_offsets(text: &str, boundary: &str) -> Vec<usize> {
    let needle = format!("\n{boundary}");
    let mut offsets = vec![0];
    let mut from = 0;

    while let Some(found) = text[from..].find(&needle) {
        let offset = from + found + 1;
        offsets.push(offset);
        from = offset;
    }

    offsets
}

fn line_number(text: &str, offset: usize) -> usize {
    text[..offset].bytes().filter(|byte| *byte == b'\n').count() + 1
}

fn validate_path(path: &str, line: usize) -> Result<(), ParseError> {
    let invalid = |reason| {
        ParseError::new(
            line,
            ErrorKind::InvalidPath {
                path: path.to_string(),
                reason,
            },
        )
    };

    if path.contains('\\') {
        return Err(invalid("backslashes are not allowed"));
    }
    for segment in path.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative segments are not allowed")),
            _ => {}
        }
    }

    Ok(())
}

/// Parses archive text into its file and directory entries, in archive order.
///
/// Comment blocks (a boundary alone on its line) are skipped, which is how section
/// separators decode. The newline that precedes a boundary belongs to the boundary,
/// not to the body before it. Empty text is an empty archive, and a header at the very
/// end of the text needs no trailing newline; its body is empty.
/// # Example
/// ```
/// let entries = hrx::parse("<===> a/input.scss\na {b: c}\n<===> a/output.css\n").unwrap();
///
/// assert_eq!(entries.len(), 2);
/// assert_eq!(entries[0].path, "a/input.scss");
/// ```
pub fn parse(text: &str) -> Result<Vec<Entry>, ParseError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }

    let boundary = read_boundary(text).ok_or(ParseError::new(1, ErrorKind::MissingBoundary))?;
    let offsets = boundary_offsets(text, boundary);

    let mut entries = Vec::new();

    for (index, &start) in offsets.iter().enumerate() {
        // the next boundary's leading newline is not part of this block
        let end = offsets
            .get(index + 1)
            .map(|next| next - 1)
            .unwrap_or(text.len());
        let block = &text[start + boundary.len()..end];
        let line = line_number(text, start);

        if block.is_empty() || block.starts_with('\n') {
            continue;
        }

        let Some(header) = block.strip_prefix(' ') else {
            let found = block.chars().next().unwrap_or_default();
            return Err(ParseError::new(
                line,
                ErrorKind::UnexpectedAfterBoundary(found),
            ));
        };

        let (path, body) = header.split_once('\n').unwrap_or((header, ""));

        if path.is_empty() {
            return Err(ParseError::new(line, ErrorKind::MissingPath));
        }

        let entry = match path.strip_suffix('/') {
            Some(directory) => {
                validate_path(directory, line)?;
                if !body.is_empty() {
                    return Err(ParseError::new(
                        line,
                        ErrorKind::DirectoryWithContents(directory.to_string()),
                    ));
                }
                Entry {
                    path: directory.to_string(),
                    kind: EntryKind::Directory,
                }
            }
            None => {
                validate_path(path, line)?;
                Entry {
                    path: path.to_string(),
                    kind: EntryKind::File(body.to_string()),
                }
            }
        };

        entries.push(entry);
    }

    Ok(entries)
}
