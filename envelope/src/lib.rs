//! # inkan-envelope
//!
//! Parsing of Notary Project signature envelopes.
//!
//! Two envelope encodings are supported, identified by media type:
//!
//! * `application/jose+json`: JWS JSON serialization ([`jws`])
//! * `application/cose`: COSE_Sign1 ([`cose`])
//!
//! Both decode into the same [`EnvelopeContent`]: the signer information
//! (algorithm, signed and unsigned attributes, certificate chain) and the
//! signed payload. Decoding checks envelope structure and the Notary header
//! rules; it never verifies the signature.
//!
//! ```ignore
//! use inkan_envelope::{media_type_from_path, parse};
//!
//! let media_type = media_type_from_path(path)?;
//! let content = parse(media_type, &bytes)?;
//! println!("{}", content.signer_info.signature_algorithm);
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod cose;
pub mod error;
pub mod jws;
pub mod media_type;

pub use error::{Error, Result};
pub use media_type::{MediaType, media_type_from_extension, media_type_from_path};

/// Content type of every Notary signature payload.
pub const MEDIA_TYPE_PAYLOAD_V1: &str = "application/vnd.cncf.notary.payload.v1+json";

pub const HEADER_SIGNING_SCHEME: &str = "io.cncf.notary.signingScheme";
pub const HEADER_SIGNING_TIME: &str = "io.cncf.notary.signingTime";
pub const HEADER_EXPIRY: &str = "io.cncf.notary.expiry";
pub const HEADER_AUTHENTIC_SIGNING_TIME: &str = "io.cncf.notary.authenticSigningTime";
pub const HEADER_SIGNING_AGENT: &str = "io.cncf.notary.signingAgent";
pub const HEADER_TIMESTAMP_SIGNATURE: &str = "io.cncf.notary.timestampSignature";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    /// `notary.x509`: the signing time is asserted by the signer.
    X509,
    /// `notary.x509.signingAuthority`: the signing time is vouched for by a
    /// signing authority.
    X509SigningAuthority,
}

impl SigningScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningScheme::X509 => "notary.x509",
            SigningScheme::X509SigningAuthority => "notary.x509.signingAuthority",
        }
    }
}

impl Display for SigningScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningScheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "notary.x509" => Ok(SigningScheme::X509),
            "notary.x509.signingAuthority" => Ok(SigningScheme::X509SigningAuthority),
            _ => Err(Error::UnsupportedSigningScheme(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    RsassaPssSha256,
    RsassaPssSha384,
    RsassaPssSha512,
    EcdsaSha256,
    EcdsaSha384,
    EcdsaSha512,
}

impl SignatureAlgorithm {
    /// From a JWS `alg` header value.
    pub fn from_jws(alg: &str) -> Option<Self> {
        match alg {
            "PS256" => Some(SignatureAlgorithm::RsassaPssSha256),
            "PS384" => Some(SignatureAlgorithm::RsassaPssSha384),
            "PS512" => Some(SignatureAlgorithm::RsassaPssSha512),
            "ES256" => Some(SignatureAlgorithm::EcdsaSha256),
            "ES384" => Some(SignatureAlgorithm::EcdsaSha384),
            "ES512" => Some(SignatureAlgorithm::EcdsaSha512),
            _ => None,
        }
    }

    /// From a COSE algorithm identifier (RFC 9053, RFC 8230).
    pub fn from_cose(alg: i128) -> Option<Self> {
        match alg {
            -37 => Some(SignatureAlgorithm::RsassaPssSha256),
            -38 => Some(SignatureAlgorithm::RsassaPssSha384),
            -39 => Some(SignatureAlgorithm::RsassaPssSha512),
            -7 => Some(SignatureAlgorithm::EcdsaSha256),
            -35 => Some(SignatureAlgorithm::EcdsaSha384),
            -36 => Some(SignatureAlgorithm::EcdsaSha512),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureAlgorithm::RsassaPssSha256 => "RSASSA-PSS-SHA-256",
            SignatureAlgorithm::RsassaPssSha384 => "RSASSA-PSS-SHA-384",
            SignatureAlgorithm::RsassaPssSha512 => "RSASSA-PSS-SHA-512",
            SignatureAlgorithm::EcdsaSha256 => "ECDSA-SHA-256",
            SignatureAlgorithm::EcdsaSha384 => "ECDSA-SHA-384",
            SignatureAlgorithm::EcdsaSha512 => "ECDSA-SHA-512",
        }
    }
}

impl Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A signed header outside the Notary-defined set.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub key: String,
    pub critical: bool,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignedAttributes {
    pub signing_scheme: SigningScheme,
    pub signing_time: DateTime<Utc>,
    pub expiry: Option<DateTime<Utc>>,
    pub authentic_signing_time: Option<DateTime<Utc>>,
    pub extended_attributes: Vec<Attribute>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnsignedAttributes {
    pub signing_agent: Option<String>,
    /// RFC 3161 timestamp token over the signature value.
    pub timestamp_signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignerInfo {
    pub signed_attributes: SignedAttributes,
    pub unsigned_attributes: UnsignedAttributes,
    pub signature_algorithm: SignatureAlgorithm,
    /// DER certificates, signing certificate first.
    pub certificate_chain: Vec<Vec<u8>>,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub content_type: String,
    pub content: Vec<u8>,
}

impl Payload {
    /// Decodes the `targetArtifact` descriptor the signature covers.
    pub fn target_artifact(&self) -> Result<Descriptor> {
        if self.content_type != MEDIA_TYPE_PAYLOAD_V1 {
            return Err(Error::UnsupportedContentType(self.content_type.clone()));
        }
        let payload: NotaryPayload = serde_json::from_slice(&self.content)
            .map_err(|e| Error::InvalidPayload(e.to_string()))?;
        Ok(payload.target_artifact)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvelopeContent {
    pub signer_info: SignerInfo,
    pub payload: Payload,
}

/// OCI content descriptor of the signed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub digest: String,
    pub size: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NotaryPayload {
    target_artifact: Descriptor,
}

/// Parses `envelope` according to `media_type`.
pub fn parse(media_type: MediaType, envelope: &[u8]) -> Result<EnvelopeContent> {
    match media_type {
        MediaType::Jws => jws::parse(envelope),
        MediaType::Cose => cose::parse(envelope),
    }
}

/// Header rules shared by both encodings.
///
/// `critical` lists the header names marked critical. Every one of them must
/// be present, and the Notary headers that must be critical have to be listed.
pub(crate) fn check_critical_headers<L>(
    critical: &[L],
    present: impl Fn(&L) -> bool,
    attributes: &SignedAttributes,
) -> Result<()>
where
    L: PartialEq<str> + Display,
{
    if let Some(missing) = critical.iter().find(|label| !present(*label)) {
        return Err(Error::MissingCriticalHeader(missing.to_string()));
    }
    let mut required = vec![HEADER_SIGNING_SCHEME];
    if attributes.expiry.is_some() {
        required.push(HEADER_EXPIRY);
    }
    match attributes.signing_scheme {
        SigningScheme::X509 => {
            if attributes.authentic_signing_time.is_some() {
                return Err(Error::HeaderNotAllowed {
                    name: HEADER_AUTHENTIC_SIGNING_TIME.to_string(),
                    scheme: attributes.signing_scheme.to_string(),
                });
            }
        }
        SigningScheme::X509SigningAuthority => {
            if attributes.authentic_signing_time.is_none() {
                return Err(Error::MissingHeader(HEADER_AUTHENTIC_SIGNING_TIME.to_string()));
            }
            required.push(HEADER_AUTHENTIC_SIGNING_TIME);
        }
    }
    match required
        .into_iter()
        .find(|name| !critical.iter().any(|c| *c == **name))
    {
        Some(name) => Err(Error::NotMarkedCritical(name.to_string())),
        None => Ok(()),
    }
}
