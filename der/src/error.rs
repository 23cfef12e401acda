use thiserror::Error;

use crate::Tag;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("parser error {0:?}")]
    Parser(nom::error::ErrorKind),
    #[error("parser incomplete: {0:?}")]
    ParserIncomplete(nom::Needed),
    #[error("indefinite length is not allowed in DER")]
    IndefiniteLength,
    #[error("length field of {0} bytes is too long")]
    LengthTooLong(u8),
    #[error("high tag numbers are not supported")]
    HighTagNumber,
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
    #[error("{0} trailing bytes after the outermost element")]
    TrailingData(usize),
    #[error("expected {expected}, but got {actual}")]
    UnexpectedTag { expected: Tag, actual: Tag },
    #[error("{0} must be constructed")]
    ExpectedConstructed(Tag),
    #[error("{0} must be primitive")]
    ExpectedPrimitive(Tag),
    #[error("missing element: {0}")]
    MissingElement(&'static str),
    #[error("OBJECT IDENTIFIER: invalid encoding")]
    InvalidObjectIdentifier,
    #[error("INTEGER: invalid encoding")]
    InvalidInteger,
    #[error("INTEGER: value does not fit in 64 bits")]
    IntegerOutOfRange,
    #[error("{0}: invalid string encoding")]
    InvalidString(Tag),
    #[error("invalid time {0:?}")]
    InvalidTime(String),
}

impl From<nom::Err<nom::error::Error<&[u8]>>> for Error {
    fn from(err: nom::Err<nom::error::Error<&[u8]>>) -> Self {
        match err {
            nom::Err::Incomplete(needed) => Error::ParserIncomplete(needed),
            nom::Err::Error(e) | nom::Err::Failure(e) => Error::Parser(e.code),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
