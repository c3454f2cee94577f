//! Filename rules for spec test directories.
//!
//! A directory is a test case when it holds exactly one input file (`input.scss` or
//! `input.sass`). Inside a test case every file falls into one [`FileKind`], decided by
//! name alone.

lazy_static::lazy_static! {
    static ref INPUT_FILE_REGEX: regex::Regex =
        regex::Regex::new(r"^input\.s[ac]ss$").expect("a valid regex pattern");
}

pub const OPTIONS_FILE: &str = "options.yml";
pub const DEFAULT_OUTPUT_FILE: &str = "output.css";

/// Category of a file within a test directory, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    /// `options.yml`
    Options,
    /// `input.scss` or `input.sass`
    Input,
    /// `output.css`
    Output,
    /// `output-*`, e.g. an implementation-specific expectation
    AlternateOutput,
    /// `warning*`
    Warning,
    /// `error*`
    Error,
    /// helpers, partials and anything else
    Other,
}
impl FileKind {
    pub fn of(name: &str) -> Self {
        if name == OPTIONS_FILE {
            Self::Options
        } else if is_input_file(name) {
            Self::Input
        } else if name == DEFAULT_OUTPUT_FILE {
            Self::Output
        } else if name.starts_with("output-") {
            Self::AlternateOutput
        } else if name.starts_with("warning") {
            Self::Warning
        } else if name.starts_with("error") {
            Self::Error
        } else {
            Self::Other
        }
    }

    /// Whether the file is something a test run produces and compares against, rather
    /// than something it reads.
    pub fn is_expectation(self) -> bool {
        matches!(
            self,
            Self::Output | Self::AlternateOutput | Self::Warning | Self::Error
        )
    }

    /// Whether the file is a source the input may load, and so must exist on disk
    /// while the test runs.
    pub fn is_source(self) -> bool {
        self != Self::Options && !self.is_expectation()
    }
}

pub fn is_input_file(name: &str) -> bool {
    INPUT_FILE_REGEX.is_match(name)
}

/// Returns the input file of a directory, or `None` unless exactly one is present.
pub fn find_input_file<'a, I>(files: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut inputs = files.into_iter().filter(|name| is_input_file(name));

    match (inputs.next(), inputs.next()) {
        (Some(input), None) => Some(input),
        _ => None,
    }
}
