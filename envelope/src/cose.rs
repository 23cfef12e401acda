//! COSE_Sign1 (`application/cose`), RFC 9052.
//!
//! ```cddl
//! COSE_Sign1_Tagged = #6.18(COSE_Sign1)
//! COSE_Sign1 = [
//!     protected   : bstr .cbor header_map,
//!     unprotected : header_map,
//!     payload     : bstr / nil,
//!     signature   : bstr
//! ]
//! ```
//!
//! Notary headers use text labels. Time headers are tagged epoch times
//! (`#6.1(int)`).

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use inkan::decoder::{DecodableFrom, Decoder};
use inkan_cbor::Value;

use crate::error::{Error, Result};
use crate::{
    Attribute, EnvelopeContent, HEADER_AUTHENTIC_SIGNING_TIME, HEADER_EXPIRY,
    HEADER_SIGNING_AGENT, HEADER_SIGNING_SCHEME, HEADER_SIGNING_TIME,
    HEADER_TIMESTAMP_SIGNATURE, MEDIA_TYPE_PAYLOAD_V1, Payload, SignatureAlgorithm,
    SignedAttributes, SignerInfo, SigningScheme, UnsignedAttributes, check_critical_headers,
};

pub const TAG_COSE_SIGN1: u64 = 18;
const TAG_EPOCH_TIME: u64 = 1;

pub const LABEL_ALG: i128 = 1;
pub const LABEL_CRIT: i128 = 2;
pub const LABEL_CONTENT_TYPE: i128 = 3;
pub const LABEL_X5CHAIN: i128 = 33;

/// A decoded COSE_Sign1 structure with its protected header unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub struct CoseSign1 {
    pub protected: Value,
    pub unprotected: Value,
    pub payload: Vec<u8>,
    pub signature: Vec<u8>,
}

impl DecodableFrom<Value> for CoseSign1 {}

impl Decoder<Value, CoseSign1> for Value {
    type Error = Error;

    fn decode(&self) -> Result<CoseSign1> {
        let message = match self.as_tag() {
            Some((TAG_COSE_SIGN1, inner)) => inner,
            Some((tag, _)) => {
                return Err(Error::MalformedEnvelope(format!(
                    "unexpected tag {tag}, expected COSE_Sign1"
                )));
            }
            None => self,
        };
        let [protected, unprotected, payload, signature] = message.as_array().unwrap_or(&[]) else {
            return Err(Error::MalformedEnvelope(
                "COSE_Sign1 must be an array of 4 elements".to_string(),
            ));
        };

        let protected = protected
            .as_bytes()
            .ok_or_else(|| malformed("protected header must be a byte string"))?;
        let protected: Value = protected.decode()?;
        if protected.as_map().is_none() {
            return Err(malformed("protected header must be a map"));
        }
        if unprotected.as_map().is_none() {
            return Err(malformed("unprotected header must be a map"));
        }
        let payload = match payload {
            Value::Bytes(payload) => payload.clone(),
            Value::Null => return Err(malformed("detached payload not supported")),
            _ => return Err(malformed("payload must be a byte string")),
        };
        let signature = signature
            .as_bytes()
            .ok_or_else(|| malformed("signature must be a byte string"))?
            .to_vec();

        Ok(CoseSign1 {
            protected,
            unprotected: unprotected.clone(),
            payload,
            signature,
        })
    }
}

fn malformed(reason: &str) -> Error {
    Error::MalformedEnvelope(reason.to_string())
}

pub fn parse(envelope: &[u8]) -> Result<EnvelopeContent> {
    let value: Value = envelope.decode()?;
    let message: CoseSign1 = value.decode()?;

    let (signature_algorithm, signed_attributes) = parse_protected(&message.protected)?;
    let unprotected = &message.unprotected;

    let certificate_chain = match unprotected.get_int(LABEL_X5CHAIN) {
        Some(Value::Bytes(cert)) => vec![cert.clone()],
        Some(Value::Array(certs)) => certs
            .iter()
            .map(|cert| {
                cert.as_bytes()
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| invalid("x5chain", "entries must be byte strings"))
            })
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(invalid("x5chain", "must be a byte string or an array")),
        None => Vec::new(),
    };
    if certificate_chain.is_empty() {
        return Err(Error::MissingCertificateChain);
    }

    let signing_agent = match unprotected.get_text(HEADER_SIGNING_AGENT) {
        Some(Value::Text(agent)) => Some(agent.clone()),
        Some(_) => return Err(invalid(HEADER_SIGNING_AGENT, "must be a text string")),
        None => None,
    };
    let timestamp_signature = match unprotected.get_text(HEADER_TIMESTAMP_SIGNATURE) {
        Some(Value::Bytes(token)) => Some(token.clone()),
        Some(_) => return Err(invalid(HEADER_TIMESTAMP_SIGNATURE, "must be a byte string")),
        None => None,
    };

    Ok(EnvelopeContent {
        signer_info: SignerInfo {
            signed_attributes,
            unsigned_attributes: UnsignedAttributes {
                signing_agent,
                timestamp_signature,
            },
            signature_algorithm,
            certificate_chain,
            signature: message.signature,
        },
        payload: Payload {
            content_type: MEDIA_TYPE_PAYLOAD_V1.to_string(),
            content: message.payload,
        },
    })
}

fn invalid(name: &str, reason: &str) -> Error {
    Error::InvalidHeader {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_protected(headers: &Value) -> Result<(SignatureAlgorithm, SignedAttributes)> {
    let alg = headers
        .get_int(LABEL_ALG)
        .ok_or_else(|| Error::MissingHeader("alg".to_string()))?
        .as_integer()
        .ok_or_else(|| invalid("alg", "must be an integer"))?;
    let signature_algorithm =
        SignatureAlgorithm::from_cose(alg).ok_or_else(|| Error::UnsupportedAlgorithm(alg.to_string()))?;

    match headers.get_int(LABEL_CONTENT_TYPE) {
        Some(Value::Text(cty)) if cty == MEDIA_TYPE_PAYLOAD_V1 => {}
        Some(Value::Text(cty)) => return Err(Error::UnsupportedContentType(cty.clone())),
        Some(_) => return Err(invalid("content type", "must be a text string")),
        None => return Err(Error::MissingHeader("content type".to_string())),
    }

    let critical = match headers.get_int(LABEL_CRIT) {
        Some(Value::Array(labels)) => labels
            .iter()
            .map(|label| Label::from_value(label).ok_or_else(|| invalid("crit", "labels must be integers or text")))
            .collect::<Result<Vec<_>>>()?,
        Some(_) => return Err(invalid("crit", "must be an array")),
        None => return Err(Error::MissingHeader("crit".to_string())),
    };

    let signing_scheme: SigningScheme = match headers.get_text(HEADER_SIGNING_SCHEME) {
        Some(Value::Text(scheme)) => scheme.parse()?,
        Some(_) => return Err(invalid(HEADER_SIGNING_SCHEME, "must be a text string")),
        None => return Err(Error::MissingHeader(HEADER_SIGNING_SCHEME.to_string())),
    };
    let signing_time = time(headers, HEADER_SIGNING_TIME)?
        .ok_or_else(|| Error::MissingHeader(HEADER_SIGNING_TIME.to_string()))?;

    let extended_attributes = headers
        .as_map()
        .unwrap_or(&[])
        .iter()
        .filter_map(|(label, value)| {
            if is_reserved(label) {
                return None;
            }
            let label = Label::from_value(label)?;
            Some(Attribute {
                critical: critical.contains(&label),
                key: label.to_string(),
                value: to_json(value),
            })
        })
        .collect();

    let attributes = SignedAttributes {
        signing_scheme,
        signing_time,
        expiry: time(headers, HEADER_EXPIRY)?,
        authentic_signing_time: time(headers, HEADER_AUTHENTIC_SIGNING_TIME)?,
        extended_attributes,
    };
    let present = |label: &Label| match label {
        Label::Int(n) => headers.get_int(*n).is_some(),
        Label::Text(s) => headers.get_text(s).is_some(),
    };
    check_critical_headers(&critical, present, &attributes)?;

    Ok((signature_algorithm, attributes))
}

/// A header label. `33` and `"33"` are different labels.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Label {
    Int(i128),
    Text(String),
}

impl Label {
    fn from_value(value: &Value) -> Option<Label> {
        match value {
            Value::Integer(n) => Some(Label::Int(*n)),
            Value::Text(s) => Some(Label::Text(s.clone())),
            _ => None,
        }
    }
}

impl PartialEq<str> for Label {
    fn eq(&self, other: &str) -> bool {
        matches!(self, Label::Text(s) if s == other)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(n) => write!(f, "{n}"),
            Label::Text(s) => f.write_str(s),
        }
    }
}

/// Header labels are integers or text; both are reported as strings.
fn label_name(label: &Value) -> Option<String> {
    Label::from_value(label).map(|label| label.to_string())
}

fn is_reserved(label: &Value) -> bool {
    match label {
        Value::Integer(n) => matches!(*n, LABEL_ALG | LABEL_CRIT | LABEL_CONTENT_TYPE),
        Value::Text(s) => matches!(
            s.as_str(),
            HEADER_SIGNING_SCHEME
                | HEADER_SIGNING_TIME
                | HEADER_EXPIRY
                | HEADER_AUTHENTIC_SIGNING_TIME
        ),
        _ => false,
    }
}

fn time(headers: &Value, name: &str) -> Result<Option<DateTime<Utc>>> {
    let Some(value) = headers.get_text(name) else {
        return Ok(None);
    };
    let seconds = match value.as_tag() {
        Some((TAG_EPOCH_TIME, Value::Integer(seconds))) => *seconds,
        _ => return Err(invalid(name, "must be a tagged epoch time")),
    };
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(Some)
        .ok_or_else(|| invalid(name, "time out of range"))
}

/// Renders a header value for display. Byte strings become standard base64.
fn to_json(value: &Value) -> serde_json::Value {
    use serde_json::Value as Json;

    match value {
        Value::Integer(n) => i64::try_from(*n)
            .map(Json::from)
            .unwrap_or_else(|_| Json::String(n.to_string())),
        Value::Bytes(b) => Json::String(STANDARD.encode(b)),
        Value::Text(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(to_json).collect()),
        Value::Map(entries) => Json::Object(
            entries
                .iter()
                .map(|(k, v)| {
                    let key = label_name(k).unwrap_or_else(|| to_json(k).to_string());
                    (key, to_json(v))
                })
                .collect(),
        ),
        Value::Tag(TAG_EPOCH_TIME, inner) => match inner.as_integer() {
            Some(seconds) => i64::try_from(seconds)
                .ok()
                .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
                .map(|t| Json::String(t.to_rfc3339()))
                .unwrap_or_else(|| to_json(inner)),
            None => to_json(inner),
        },
        Value::Tag(_, inner) => to_json(inner),
        Value::Bool(b) => Json::Bool(*b),
        Value::Null | Value::Undefined => Json::Null,
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Json::Number)
            .unwrap_or(Json::Null),
        Value::Simple(n) => Json::from(*n),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    const BLOB_SIGNATURE: &[u8] = include_bytes!("../../testdata/blob.txt.cose.sig");
    const JWS_SIGNATURE: &[u8] = include_bytes!("../../testdata/blob.txt.jws.sig");

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn epoch(seconds: i128) -> Value {
        Value::Tag(TAG_EPOCH_TIME, Box::new(Value::Integer(seconds)))
    }

    fn protected_headers() -> Vec<(Value, Value)> {
        vec![
            (Value::Integer(LABEL_ALG), Value::Integer(-37)),
            (
                Value::Integer(LABEL_CRIT),
                Value::Array(vec![text(HEADER_SIGNING_SCHEME)]),
            ),
            (Value::Integer(LABEL_CONTENT_TYPE), text(MEDIA_TYPE_PAYLOAD_V1)),
            (text(HEADER_SIGNING_SCHEME), text("notary.x509")),
            (text(HEADER_SIGNING_TIME), epoch(1718000000)),
        ]
    }

    #[test]
    fn test_parse_blob_signature() {
        let content = parse(BLOB_SIGNATURE).unwrap();
        let signer = &content.signer_info;
        assert_eq!(SignatureAlgorithm::EcdsaSha256, signer.signature_algorithm);
        assert_eq!(2, signer.certificate_chain.len());

        let attrs = &signer.signed_attributes;
        assert_eq!(SigningScheme::X509, attrs.signing_scheme);
        assert_eq!(
            Utc.with_ymd_and_hms(2024, 6, 10, 6, 13, 20).unwrap(),
            attrs.signing_time
        );
        assert_eq!(
            Some(Utc.with_ymd_and_hms(2025, 6, 10, 6, 13, 20).unwrap()),
            attrs.expiry
        );
        assert_eq!(
            vec![Attribute {
                key: "buildId".to_string(),
                critical: true,
                value: json!("42"),
            }],
            attrs.extended_attributes
        );
        assert_eq!(
            Some("inkan-test/0.0.1"),
            signer.unsigned_attributes.signing_agent.as_deref()
        );
        assert!(signer.unsigned_attributes.timestamp_signature.is_some());
        assert_eq!(12, content.payload.target_artifact().unwrap().size);
    }

    #[test]
    fn test_cose_and_jws_fixtures_agree() {
        let cose = parse(BLOB_SIGNATURE).unwrap();
        let jws = crate::jws::parse(JWS_SIGNATURE).unwrap();
        assert_eq!(
            jws.signer_info.signed_attributes,
            cose.signer_info.signed_attributes
        );
        assert_eq!(
            jws.signer_info.certificate_chain,
            cose.signer_info.certificate_chain
        );
        assert_eq!(jws.payload, cose.payload);
    }

    #[test]
    fn test_decode_untagged_message() {
        let message = Value::Array(vec![
            Value::Bytes(vec![0xa0]),
            Value::Map(vec![]),
            Value::Bytes(b"payload".to_vec()),
            Value::Bytes(vec![0; 4]),
        ]);
        let decoded: CoseSign1 = message.decode().unwrap();
        assert_eq!(Value::Map(vec![]), decoded.protected);
        assert_eq!(b"payload".to_vec(), decoded.payload);
    }

    #[rstest(message,
        case(Value::Tag(98, Box::new(Value::Array(vec![])))),
        case(Value::Array(vec![Value::Null; 3])),
        case(Value::Map(vec![])),
        case(Value::Array(vec![
            Value::Bytes(vec![0xa0]),
            Value::Map(vec![]),
            Value::Null,
            Value::Bytes(vec![]),
        ])),
        case(Value::Array(vec![
            Value::Bytes(vec![0x80]),
            Value::Map(vec![]),
            Value::Bytes(vec![]),
            Value::Bytes(vec![]),
        ])),
    )]
    fn test_decode_rejects_malformed(message: Value) {
        let result: Result<CoseSign1> = message.decode();
        assert!(matches!(result, Err(Error::MalformedEnvelope(_))));
    }

    #[test]
    fn test_parse_protected() {
        let mut entries = protected_headers();
        entries.push((Value::Integer(-70000), Value::Bytes(vec![0xde, 0xad])));
        let (alg, attrs) = parse_protected(&Value::Map(entries)).unwrap();
        assert_eq!(SignatureAlgorithm::RsassaPssSha256, alg);
        assert_eq!(
            vec![Attribute {
                key: "-70000".to_string(),
                critical: false,
                value: json!("3q0="),
            }],
            attrs.extended_attributes
        );
    }

    fn with_critical(extra_crit: Value, extra_header: Value) -> Value {
        let entries = protected_headers()
            .into_iter()
            .map(|(k, v)| match (k, v) {
                (Value::Integer(LABEL_CRIT), Value::Array(mut labels)) => {
                    labels.push(extra_crit.clone());
                    (Value::Integer(LABEL_CRIT), Value::Array(labels))
                }
                entry => entry,
            })
            .chain([(extra_header, text("x"))])
            .collect();
        Value::Map(entries)
    }

    #[rstest(crit, header, accepted,
        case(Value::Integer(-70000), Value::Integer(-70000), true),
        case(text("-70000"), text("-70000"), true),
        case(text("-70000"), Value::Integer(-70000), false),
        case(Value::Integer(-70000), text("-70000"), false),
    )]
    fn test_parse_protected_critical_label_kind(crit: Value, header: Value, accepted: bool) {
        let result = parse_protected(&with_critical(crit, header));
        if accepted {
            let (_, attrs) = result.unwrap();
            assert_eq!("-70000", attrs.extended_attributes[0].key);
            assert!(attrs.extended_attributes[0].critical);
        } else {
            assert!(matches!(
                result,
                Err(Error::MissingCriticalHeader(label)) if label == "-70000"
            ));
        }
    }

    #[rstest(label, value,
        case(Value::Integer(LABEL_ALG), Value::Integer(-257)),
        case(Value::Integer(LABEL_ALG), text("ES256")),
        case(Value::Integer(LABEL_CONTENT_TYPE), text("application/json")),
        case(Value::Integer(LABEL_CRIT), Value::Array(vec![])),
        case(text(HEADER_SIGNING_SCHEME), text("notary.default")),
        case(text(HEADER_SIGNING_TIME), Value::Integer(1718000000)),
        case(text(HEADER_SIGNING_TIME), text("2024-06-10T06:13:20Z")),
    )]
    fn test_parse_protected_rejects(label: Value, value: Value) {
        let entries = protected_headers()
            .into_iter()
            .map(|(k, v)| if k == label { (k, value.clone()) } else { (k, v) })
            .collect();
        assert!(parse_protected(&Value::Map(entries)).is_err());
    }

    #[rstest(input, expected,
        case(Value::Integer(7), json!(7)),
        case(Value::Integer(-7), json!(-7)),
        case(Value::Bool(true), json!(true)),
        case(Value::Array(vec![text("a"), Value::Null]), json!(["a", null])),
        case(Value::Map(vec![(Value::Integer(1), text("x"))]), json!({"1": "x"})),
        case(epoch(0), json!("1970-01-01T00:00:00+00:00")),
    )]
    fn test_to_json(input: Value, expected: serde_json::Value) {
        assert_eq!(expected, to_json(&input));
    }
}
