use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const MEDIA_TYPE_JWS: &str = "application/jose+json";
pub const MEDIA_TYPE_COSE: &str = "application/cose";

/// Suffix appended to blob signature files, e.g. `artifact.tar.jws.sig`.
const SIGNATURE_EXTENSION: &str = "sig";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Jws,
    Cose,
}

impl MediaType {
    pub const ALL: [MediaType; 2] = [MediaType::Jws, MediaType::Cose];

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Jws => MEDIA_TYPE_JWS,
            MediaType::Cose => MEDIA_TYPE_COSE,
        }
    }

    /// Short format name as used in file extensions.
    pub fn format(&self) -> &'static str {
        match self {
            MediaType::Jws => "jws",
            MediaType::Cose => "cose",
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            MEDIA_TYPE_JWS => Ok(MediaType::Jws),
            MEDIA_TYPE_COSE => Ok(MediaType::Cose),
            _ => Err(Error::UnsupportedMediaType(s.to_string())),
        }
    }
}

/// Resolves the envelope media type from a file extension such as `jws` or
/// `.COSE`.
pub fn media_type_from_extension(extension: &str) -> Result<MediaType> {
    let format = extension.strip_prefix('.').unwrap_or(extension);
    MediaType::ALL
        .into_iter()
        .find(|media_type| format.eq_ignore_ascii_case(media_type.format()))
        .ok_or_else(|| Error::UnsupportedSignatureFormat(format.to_string()))
}

/// Resolves the envelope media type of a signature file from its name.
///
/// The last extension decides, except that a trailing `.sig` is skipped so
/// that `<blob>.<format>.sig` resolves by `<format>`.
pub fn media_type_from_path(path: &Path) -> Result<MediaType> {
    let extension = |p: &Path| {
        p.extension()
            .map(|ext| ext.to_string_lossy().into_owned())
            .unwrap_or_default()
    };
    let mut ext = extension(path);
    if ext.eq_ignore_ascii_case(SIGNATURE_EXTENSION) {
        if let Some(stem) = path.file_stem() {
            ext = extension(Path::new(stem));
        }
    }
    media_type_from_extension(&ext)
}
