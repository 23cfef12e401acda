use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error(
        "missing signature path: use `inkan blob inspect --help` to see what parameters are required"
    )]
    MissingSignaturePath,

    #[error("unrecognized output format {0}")]
    UnrecognizedOutputFormat(String),

    #[error("{0}")]
    MediaType(inkan_envelope::Error),

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("file {path} exceeds the maximum size of {max} bytes")]
    FileTooLarge { path: String, max: u64 },

    #[error("failed to inspect signature: {0}")]
    Inspect(#[from] inkan_envelope::Error),

    #[error("failed to decode certificate: {0}")]
    Certificate(#[from] inkan_x509::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
