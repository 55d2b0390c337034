use std::io;
use std::path::PathBuf;

/// Failure kinds across the whole fetch pipeline.
///
/// Resolution-phase errors abort the run; download-phase errors are captured
/// per task as failed outcomes and never touch sibling transfers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport-level failure: connect, timeout, broken stream.
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The server answered, but with a non-success status code.
    #[error("server returned HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    /// The response decoded, but not into the shape the API promises.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Could not create a directory or write a destination file.
    #[error("filesystem error at {}: {source}", path.display())]
    Filesystem { path: PathBuf, source: io::Error },

    /// The operator asked for something the catalog cannot satisfy.
    #[error("invalid selection: {0}")]
    UserInput(String),
}
