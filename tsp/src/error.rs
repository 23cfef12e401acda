use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid DER: {0}")]
    Der(#[from] inkan_der::Error),
    #[error("invalid TSA certificate: {0}")]
    Certificate(#[from] inkan_x509::Error),
    #[error("content type {0} is not signed data")]
    NotSignedData(String),
    #[error("encapsulated content type {0} is not TSTInfo")]
    NotTstInfo(String),
    #[error("unsupported TSTInfo version {0}")]
    UnsupportedVersion(u64),
    #[error("accuracy field out of range: {0}")]
    InvalidAccuracy(&'static str),
    #[error("genTime plus or minus accuracy is out of the representable range")]
    TimeOutOfRange,
}

pub type Result<T> = std::result::Result<T, Error>;
