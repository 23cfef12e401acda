use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid DER: {0}")]
    Der(#[from] inkan_der::Error),
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),
    #[error("invalid TBS certificate: {0}")]
    InvalidTBSCertificate(String),
    #[error("invalid name: {0}")]
    InvalidName(String),
    #[error("invalid validity: {0}")]
    InvalidValidity(String),
}

pub type Result<T> = std::result::Result<T, Error>;
