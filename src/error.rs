use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Conditions which stop processing of the transport stream.
///
/// Problems confined to individual packets, tables or PES headers are not represented here; they
/// are logged and the affected data skipped.
#[derive(Error, Debug)]
pub enum Error {
    #[error("corrupted input: {0}")]
    CorruptedInput(String),

    #[error("failed to {action} {path:?}: {source}")]
    CorruptedOutput {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("no audio or video output name given")]
    NoOutput,

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// The process exit status which reports this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::NoOutput => 4,
            Error::CorruptedInput(_) => 5,
            Error::CorruptedOutput { .. } => 6,
            Error::Io(_) => 7,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
