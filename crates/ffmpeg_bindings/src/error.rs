use std::{io, process::ExitStatus};

#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("`{tool}` not found on PATH")]
    ToolNotFound { tool: String },

    #[error("`{tool}` exited with {status}: {stderr}")]
    CommandFailed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to parse `{tool}` output: {message}")]
    OutputParse { tool: String, message: String },
}

impl FfmpegError {
    /// Maps a spawn failure to [`FfmpegError::ToolNotFound`] when the binary
    /// is missing, and to [`FfmpegError::Io`] otherwise.
    pub(crate) fn from_spawn(tool: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            FfmpegError::ToolNotFound { tool: tool.into() }
        } else {
            FfmpegError::Io(err)
        }
    }
}
