use std::fmt;
use std::path::{Path, PathBuf};

/// Fatal linkage errors. Malformed registry fragments and short insurance
/// rows are recovered in place and only show up as summary counters.
#[derive(Debug)]
pub enum LinkError {
    /// An input path does not exist or cannot be opened.
    MissingFile { path: PathBuf, reason: String },
    /// Read failure after the file was opened.
    Io { path: PathBuf, reason: String },
    /// Delimited-file framing error in the insurance feed.
    Csv { path: PathBuf, reason: String },
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (empty strategy list, bad delimiter, etc.).
    ConfigValidation(String),
    /// Write failure on a matched or unmatched output stream.
    Output { stream: &'static str, reason: String },
    /// A pipeline worker thread panicked or hung up early.
    Worker(String),
}

impl LinkError {
    pub fn missing(path: &Path, err: impl fmt::Display) -> Self {
        Self::MissingFile { path: path.to_path_buf(), reason: err.to_string() }
    }

    pub fn io(path: &Path, err: impl fmt::Display) -> Self {
        Self::Io { path: path.to_path_buf(), reason: err.to_string() }
    }

    pub fn output(stream: &'static str, err: impl fmt::Display) -> Self {
        Self::Output { stream, reason: err.to_string() }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingFile { path, reason } => {
                write!(f, "cannot open input '{}': {reason}", path.display())
            }
            Self::Io { path, reason } => write!(f, "read error in '{}': {reason}", path.display()),
            Self::Csv { path, reason } => {
                write!(f, "delimited parse error in '{}': {reason}", path.display())
            }
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Output { stream, reason } => write!(f, "cannot write {stream} output: {reason}"),
            Self::Worker(msg) => write!(f, "pipeline worker failed: {msg}"),
        }
    }
}

impl std::error::Error for LinkError {}
