use thiserror::Error;

/// Errors raised while resolving or parsing a signature envelope.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "signature format {0:?} not supported\nSupported signature envelope formats are \"jws\" and \"cose\""
    )]
    UnsupportedSignatureFormat(String),

    #[error("envelope media type {0:?} not supported")]
    UnsupportedMediaType(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CBOR: {0}")]
    Cbor(#[from] inkan_cbor::Error),

    #[error("{field}: base64 decode: {source}")]
    Base64 {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("missing header {0:?}")]
    MissingHeader(String),

    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("signature algorithm {0} not supported")]
    UnsupportedAlgorithm(String),

    #[error("signing scheme {0:?} not supported")]
    UnsupportedSigningScheme(String),

    #[error("payload content type {0:?} not supported")]
    UnsupportedContentType(String),

    #[error("header {0:?} is listed as critical but missing")]
    MissingCriticalHeader(String),

    #[error("header {0:?} must be marked critical")]
    NotMarkedCritical(String),

    #[error("header {name:?} is not allowed with signing scheme {scheme}")]
    HeaderNotAllowed { name: String, scheme: String },

    #[error("certificate chain is missing")]
    MissingCertificateChain,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

pub type Result<T> = std::result::Result<T, Error>;
