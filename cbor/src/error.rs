use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("parser error {0:?}")]
    Parser(nom::error::ErrorKind),
    #[error("parser incomplete: {0:?}")]
    ParserIncomplete(nom::Needed),
    #[error("reserved additional information {0}")]
    ReservedAdditionalInfo(u8),
    #[error("unexpected break code")]
    UnexpectedBreak,
    #[error("indefinite-length {0} contains a chunk of another type")]
    InvalidChunk(&'static str),
    #[error("text string is not valid UTF-8")]
    InvalidUtf8,
    #[error("duplicate map key")]
    DuplicateMapKey,
    #[error("nesting deeper than {0} levels")]
    TooDeep(usize),
    #[error("{0} trailing bytes after the data item")]
    TrailingData(usize),
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
