//! CLI Exit Code Registry
//!
//! Single source of truth for `carrierlink` exit codes. Scripts that drive
//! batch runs branch on these, so a code never changes meaning once shipped.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad arguments; clap also exits with 2)  |
//! | 3    | Input missing, unreadable, or not parseable          |
//! | 4    | Config file unreadable or invalid                    |
//! | 5    | Runtime failure (output stream or worker)            |

use carrierlink_linkage::LinkError;

/// Success - run completed; unmatched records are not a failure.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
#[allow(dead_code)]
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments. Emitted by clap's own argument errors.
#[allow(dead_code)]
pub const EXIT_USAGE: u8 = 2;

/// An input path does not exist, cannot be read, or its framing is broken
/// beyond row-level recovery.
pub const EXIT_INPUT: u8 = 3;

/// Config could not be read, parsed, or validated.
pub const EXIT_INVALID_CONFIG: u8 = 4;

/// Output could not be written or a pipeline worker failed.
pub const EXIT_RUNTIME: u8 = 5;

/// Map a linkage error to its exit code.
pub fn link_exit_code(err: &LinkError) -> u8 {
    match err {
        LinkError::MissingFile { .. } | LinkError::Io { .. } | LinkError::Csv { .. } => EXIT_INPUT,
        LinkError::ConfigParse(_) | LinkError::ConfigValidation(_) => EXIT_INVALID_CONFIG,
        LinkError::Output { .. } | LinkError::Worker(_) => EXIT_RUNTIME,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn codes_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_ERROR, EXIT_USAGE, EXIT_INPUT, EXIT_INVALID_CONFIG, EXIT_RUNTIME];
        let mut sorted = codes.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), codes.len());
    }

    #[test]
    fn link_errors_map_by_kind() {
        let missing = LinkError::MissingFile { path: PathBuf::from("x"), reason: "gone".into() };
        assert_eq!(link_exit_code(&missing), EXIT_INPUT);
        assert_eq!(link_exit_code(&LinkError::ConfigValidation("bad".into())), EXIT_INVALID_CONFIG);
        assert_eq!(link_exit_code(&LinkError::output("matched", "disk full")), EXIT_RUNTIME);
    }
}
