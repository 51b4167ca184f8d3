//! # ffmpeg_bindings
//!
//! Thin async wrappers around the `ffmpeg` and `ffprobe` command line tools.
//!
//! The crate shells out to whatever binaries are on `PATH` (or the paths
//! given to [`Ffmpeg::with_binaries`]) and exposes the handful of operations
//! the video pipeline needs: transcoding, stream-copy concatenation,
//! filter-graph composition, media probing and screen capture.

mod capture;
mod error;
mod ffmpeg;
mod probe;

pub use capture::CaptureHandle;
pub use error::FfmpegError;
pub use ffmpeg::Ffmpeg;
