//! Unified error type for the reelforge engine.
//!
//! Every failure a recipe run can produce is funnelled into [`Error`]. The
//! first stage-level failure aborts the whole recipe; nothing in this crate
//! retries. Integrity-check findings are the one exception: they are
//! recorded on the [`JobReport`](crate::transcoder::JobReport) instead of
//! raised, because the recipe did mechanically run to completion.

use std::path::PathBuf;
use std::time::Duration;

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while resolving and running a recipe.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input file does not exist at the start of a run. Raised before
    /// any stage executes; no process is spawned.
    #[error("input file not found: {}", path.display())]
    InputFileNotFound { path: PathBuf },

    /// A stage's leading token does not map to any registered tool.
    #[error("unknown tool: {token:?} is not registered")]
    UnknownTool { token: String },

    /// A placeholder could not be resolved, or a numeric dimension was
    /// missing or invalid.
    #[error("parameter error: {0}")]
    Parameter(String),

    /// The tool rejected the command syntax.
    #[error("invalid command [{tool}]: {message}")]
    InvalidCommand { tool: String, message: String },

    /// The tool rejected the media content.
    #[error("invalid file [{tool}]: {message}")]
    InvalidFile { tool: String, message: String },

    /// The prober could not read the media file.
    #[error("invalid media: {0}")]
    InvalidMedia(String),

    /// Tool output matched no known success or failure pattern.
    #[error("unexpected result [{tool}]: {message}")]
    UnexpectedResult { tool: String, message: String },

    /// The watchdog timed out waiting for output and the process was killed.
    #[error("process hung: no output for {timeout:?}")]
    ProcessHung { timeout: Duration },

    /// An OS-level spawn or pipe failure.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all wrapping any unclassified failure, original message kept.
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Convenience constructor for [`Error::InputFileNotFound`].
    pub fn input_file_not_found(path: impl Into<PathBuf>) -> Self {
        Error::InputFileNotFound { path: path.into() }
    }

    /// Convenience constructor for [`Error::UnknownTool`].
    pub fn unknown_tool(token: impl Into<String>) -> Self {
        Error::UnknownTool {
            token: token.into(),
        }
    }

    /// Convenience constructor for [`Error::Parameter`].
    pub fn parameter(message: impl Into<String>) -> Self {
        Error::Parameter(message.into())
    }

    /// Convenience constructor for [`Error::InvalidCommand`].
    pub fn invalid_command(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidCommand {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidFile`].
    pub fn invalid_file(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidFile {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::UnexpectedResult`].
    pub fn unexpected_result(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::UnexpectedResult {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Unknown`].
    pub fn unknown(message: impl Into<String>) -> Self {
        Error::Unknown(message.into())
    }

    /// Whether this error belongs to the defined taxonomy, as opposed to an
    /// unclassified failure the orchestrator must wrap into
    /// [`Error::Unknown`] before letting it escape.
    pub fn is_classified(&self) -> bool {
        !matches!(self, Error::Io { .. } | Error::Unknown(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_file_not_found_display() {
        let err = Error::input_file_not_found("/no/such/file.mp4");
        assert_eq!(err.to_string(), "input file not found: /no/such/file.mp4");
    }

    #[test]
    fn unknown_tool_display() {
        let err = Error::unknown_tool("frobnicate");
        assert!(err.to_string().contains("frobnicate"));
    }

    #[test]
    fn process_hung_display() {
        let err = Error::ProcessHung {
            timeout: Duration::from_secs(200),
        };
        assert!(err.to_string().contains("200"));
    }

    #[test]
    fn io_errors_are_unclassified() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err = Error::from(io);
        assert!(!err.is_classified());
        assert!(Error::parameter("bad width").is_classified());
        assert!(!Error::unknown("boom").is_classified());
    }

    #[test]
    fn invalid_command_display() {
        let err = Error::invalid_command("ffmpeg", "must pass a command to ffmpeg");
        assert_eq!(
            err.to_string(),
            "invalid command [ffmpeg]: must pass a command to ffmpeg"
        );
    }
}
