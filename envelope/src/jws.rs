//! JWS JSON serialization (`application/jose+json`).
//!
//! ```json
//! {
//!   "payload": "<base64url>",
//!   "protected": "<base64url of the protected header JSON>",
//!   "header": {
//!     "x5c": ["<base64 DER>", ...],
//!     "io.cncf.notary.signingAgent": "...",
//!     "io.cncf.notary.timestampSignature": "<base64 DER>"
//!   },
//!   "signature": "<base64url>"
//! }
//! ```

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::{
    Attribute, EnvelopeContent, HEADER_AUTHENTIC_SIGNING_TIME, HEADER_EXPIRY,
    HEADER_SIGNING_SCHEME, HEADER_SIGNING_TIME, MEDIA_TYPE_PAYLOAD_V1, Payload,
    SignatureAlgorithm, SignedAttributes, SignerInfo, SigningScheme, UnsignedAttributes,
    check_critical_headers,
};

const HEADER_ALG: &str = "alg";
const HEADER_CTY: &str = "cty";
const HEADER_CRIT: &str = "crit";

#[derive(Debug, Deserialize)]
struct JwsEnvelope {
    payload: String,
    protected: String,
    header: UnprotectedHeader,
    signature: String,
}

#[derive(Debug, Deserialize)]
struct UnprotectedHeader {
    #[serde(default)]
    x5c: Vec<String>,
    #[serde(rename = "io.cncf.notary.signingAgent", default)]
    signing_agent: Option<String>,
    #[serde(rename = "io.cncf.notary.timestampSignature", default)]
    timestamp_signature: Option<String>,
}

pub fn parse(envelope: &[u8]) -> Result<EnvelopeContent> {
    let envelope: JwsEnvelope = serde_json::from_slice(envelope)?;

    let protected = decode(&URL_SAFE_NO_PAD, "protected", &envelope.protected)?;
    let protected: Map<String, Value> = serde_json::from_slice(&protected)?;
    let (signature_algorithm, signed_attributes) = parse_protected(&protected)?;

    let certificate_chain = envelope
        .header
        .x5c
        .iter()
        .map(|cert| decode(&STANDARD, "x5c", cert))
        .collect::<Result<Vec<_>>>()?;
    if certificate_chain.is_empty() {
        return Err(Error::MissingCertificateChain);
    }
    let timestamp_signature = envelope
        .header
        .timestamp_signature
        .as_deref()
        .map(|token| decode(&STANDARD, "timestampSignature", token))
        .transpose()?;

    Ok(EnvelopeContent {
        signer_info: SignerInfo {
            signed_attributes,
            unsigned_attributes: UnsignedAttributes {
                signing_agent: envelope.header.signing_agent,
                timestamp_signature,
            },
            signature_algorithm,
            certificate_chain,
            signature: decode(&URL_SAFE_NO_PAD, "signature", &envelope.signature)?,
        },
        payload: Payload {
            content_type: MEDIA_TYPE_PAYLOAD_V1.to_string(),
            content: decode(&URL_SAFE_NO_PAD, "payload", &envelope.payload)?,
        },
    })
}

fn decode<E: Engine>(engine: &E, field: &'static str, input: &str) -> Result<Vec<u8>> {
    engine
        .decode(input)
        .map_err(|source| Error::Base64 { field, source })
}

fn parse_protected(headers: &Map<String, Value>) -> Result<(SignatureAlgorithm, SignedAttributes)> {
    let alg = required_str(headers, HEADER_ALG)?;
    let signature_algorithm =
        SignatureAlgorithm::from_jws(alg).ok_or_else(|| Error::UnsupportedAlgorithm(alg.to_string()))?;

    let cty = required_str(headers, HEADER_CTY)?;
    if cty != MEDIA_TYPE_PAYLOAD_V1 {
        return Err(Error::UnsupportedContentType(cty.to_string()));
    }

    let critical = match headers.get(HEADER_CRIT) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str().map(str::to_string).ok_or_else(|| Error::InvalidHeader {
                    name: HEADER_CRIT.to_string(),
                    reason: "entries must be strings".to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => {
            return Err(Error::InvalidHeader {
                name: HEADER_CRIT.to_string(),
                reason: "must be an array".to_string(),
            });
        }
        None => return Err(Error::MissingHeader(HEADER_CRIT.to_string())),
    };

    let signing_scheme: SigningScheme = required_str(headers, HEADER_SIGNING_SCHEME)?.parse()?;
    let signing_time = time(headers, HEADER_SIGNING_TIME)?
        .ok_or_else(|| Error::MissingHeader(HEADER_SIGNING_TIME.to_string()))?;

    let extended_attributes = headers
        .iter()
        .filter(|(key, _)| !is_reserved(key))
        .map(|(key, value)| Attribute {
            key: key.clone(),
            critical: critical.iter().any(|c| c == key),
            value: value.clone(),
        })
        .collect();

    let attributes = SignedAttributes {
        signing_scheme,
        signing_time,
        expiry: time(headers, HEADER_EXPIRY)?,
        authentic_signing_time: time(headers, HEADER_AUTHENTIC_SIGNING_TIME)?,
        extended_attributes,
    };
    check_critical_headers(&critical, |name| headers.contains_key(name), &attributes)?;

    Ok((signature_algorithm, attributes))
}

fn is_reserved(key: &str) -> bool {
    matches!(
        key,
        HEADER_ALG
            | HEADER_CTY
            | HEADER_CRIT
            | HEADER_SIGNING_SCHEME
            | HEADER_SIGNING_TIME
            | HEADER_EXPIRY
            | HEADER_AUTHENTIC_SIGNING_TIME
    )
}

fn required_str<'a>(headers: &'a Map<String, Value>, name: &str) -> Result<&'a str> {
    match headers.get(name) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(Error::InvalidHeader {
            name: name.to_string(),
            reason: "must be a string".to_string(),
        }),
        None => Err(Error::MissingHeader(name.to_string())),
    }
}

/// RFC 3339 time header, if present.
fn time(headers: &Map<String, Value>, name: &str) -> Result<Option<DateTime<Utc>>> {
    if !headers.contains_key(name) {
        return Ok(None);
    }
    let value = required_str(headers, name)?;
    DateTime::parse_from_rfc3339(value)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| Error::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })
}
