//! Signature summaries shown by the inspect commands.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use inkan::decoder::Decoder;
use inkan_envelope::{Descriptor, EnvelopeContent, MediaType};
use inkan_tsp::TimestampToken;
use inkan_x509::Certificate;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;

/// `Mon Jan  2 15:04:05 2006`
const TIME_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InspectOutput {
    pub(crate) media_type: String,
    pub(crate) signatures: Vec<SignatureOutput>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignatureOutput {
    pub(crate) media_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) digest: Option<String>,
    pub(crate) signature_algorithm: String,
    pub(crate) signed_attributes: BTreeMap<String, String>,
    pub(crate) user_defined_attributes: BTreeMap<String, String>,
    pub(crate) unsigned_attributes: UnsignedAttributesOutput,
    pub(crate) certificates: Vec<CertificateOutput>,
    pub(crate) signed_artifact: Descriptor,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UnsignedAttributesOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) signing_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) timestamp_signature: Option<TimestampOutput>,
}

/// Either the decoded timestamp or the reason it could not be decoded.
#[derive(Debug, Clone, Default, Serialize)]
pub(crate) struct TimestampOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) certificates: Option<Vec<CertificateOutput>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CertificateOutput {
    #[serde(rename = "SHA256Fingerprint")]
    pub(crate) sha256_fingerprint: String,
    pub(crate) issued_to: String,
    pub(crate) issued_by: String,
    pub(crate) expiry: String,
}

impl From<&Certificate> for CertificateOutput {
    fn from(cert: &Certificate) -> Self {
        CertificateOutput {
            sha256_fingerprint: cert.sha256_fingerprint(),
            issued_to: cert.subject().to_string(),
            issued_by: cert.issuer().to_string(),
            expiry: format_naive(cert.validity().not_after),
        }
    }
}

pub(crate) fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn format_naive(time: NaiveDateTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

/// Parses `envelope` and summarizes its signatures.
///
/// `artifact_ref` is the digest of the signature manifest when the envelope
/// came from a registry; blob signatures pass an empty string.
pub(crate) fn signatures(
    media_type: MediaType,
    artifact_ref: &str,
    envelope: &[u8],
) -> Result<Vec<SignatureOutput>> {
    let content = inkan_envelope::parse(media_type, envelope)?;
    debug!(
        algorithm = %content.signer_info.signature_algorithm,
        certificates = content.signer_info.certificate_chain.len(),
        "parsed signature envelope"
    );
    Ok(vec![signature_output(media_type, artifact_ref, &content)?])
}

fn signature_output(
    media_type: MediaType,
    artifact_ref: &str,
    content: &EnvelopeContent,
) -> Result<SignatureOutput> {
    let signer = &content.signer_info;
    let signed = &signer.signed_attributes;

    let mut signed_attributes = BTreeMap::from([
        ("contentType".to_string(), content.payload.content_type.clone()),
        ("signingScheme".to_string(), signed.signing_scheme.to_string()),
        ("signingTime".to_string(), format_time(signed.signing_time)),
    ]);
    if let Some(expiry) = signed.expiry {
        signed_attributes.insert("expiry".to_string(), format_time(expiry));
    }
    if let Some(time) = signed.authentic_signing_time {
        signed_attributes.insert("authenticSigningTime".to_string(), format_time(time));
    }
    for attribute in &signed.extended_attributes {
        let value = match &attribute.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        signed_attributes.insert(attribute.key.clone(), value);
    }

    let certificates = signer
        .certificate_chain
        .iter()
        .map(|der| -> Result<CertificateOutput> {
            let cert: Certificate = der.as_slice().decode()?;
            Ok(CertificateOutput::from(&cert))
        })
        .collect::<Result<Vec<_>>>()?;

    let signed_artifact = content.payload.target_artifact()?;

    Ok(SignatureOutput {
        media_type: media_type.to_string(),
        digest: (!artifact_ref.is_empty()).then(|| artifact_ref.to_string()),
        signature_algorithm: signer.signature_algorithm.to_string(),
        signed_attributes,
        user_defined_attributes: signed_artifact.annotations.clone().unwrap_or_default(),
        unsigned_attributes: UnsignedAttributesOutput {
            signing_agent: signer.unsigned_attributes.signing_agent.clone(),
            timestamp_signature: signer
                .unsigned_attributes
                .timestamp_signature
                .as_deref()
                .map(timestamp_output),
        },
        certificates,
        signed_artifact,
    })
}

/// A token that cannot be decoded is reported, not treated as fatal.
fn timestamp_output(token: &[u8]) -> TimestampOutput {
    let token: inkan_tsp::Result<TimestampToken> = token.decode();
    match token {
        Ok(token) => {
            let (earliest, latest) = token.range();
            TimestampOutput {
                timestamp: Some(format!(
                    "[{}, {}]",
                    format_naive(earliest),
                    format_naive(latest)
                )),
                certificates: Some(
                    token
                        .certificates()
                        .iter()
                        .map(CertificateOutput::from)
                        .collect(),
                ),
                error: None,
            }
        }
        Err(e) => {
            warn!(error = %e, "failed to decode timestamp signature");
            TimestampOutput {
                error: Some(e.to_string()),
                ..Default::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    const JWS_SIGNATURE: &[u8] = include_bytes!("../../testdata/blob.txt.jws.sig");
    const COSE_SIGNATURE: &[u8] = include_bytes!("../../testdata/blob.txt.cose.sig");
    const SIGNING_AUTHORITY: &[u8] = include_bytes!("../../testdata/signing-authority.jws");
    const LEAF: &[u8] = include_bytes!("../../testdata/certs/leaf.der");
    const WIDE_ACCURACY_TOKEN: &[u8] = include_bytes!("../../testdata/tsa/wide-accuracy.der");

    #[rstest(media_type, envelope,
        case(MediaType::Jws, JWS_SIGNATURE),
        case(MediaType::Cose, COSE_SIGNATURE),
    )]
    fn test_signatures(media_type: MediaType, envelope: &[u8]) {
        let outputs = signatures(media_type, "", envelope).unwrap();
        assert_eq!(1, outputs.len());
        let output = &outputs[0];

        assert_eq!(media_type.as_str(), output.media_type);
        assert_eq!(None, output.digest);
        assert_eq!("ECDSA-SHA-256", output.signature_algorithm);
        assert_eq!("notary.x509", output.signed_attributes["signingScheme"]);
        assert_eq!(
            "Mon Jun 10 06:13:20 2024",
            output.signed_attributes["signingTime"]
        );
        assert_eq!("Tue Jun 10 06:13:20 2025", output.signed_attributes["expiry"]);
        assert_eq!("42", output.signed_attributes["buildId"]);
        assert_eq!(
            BTreeMap::from([("version".to_string(), "1.0".to_string())]),
            output.user_defined_attributes
        );

        assert_eq!(2, output.certificates.len());
        assert_eq!(
            "CN=Inkan Test Signer,O=Inkan Test,C=US",
            output.certificates[0].issued_to
        );
        assert_eq!(
            "CN=Inkan Test Root,O=Inkan Test,C=US",
            output.certificates[0].issued_by
        );
        assert_eq!(
            "Sun Jan  1 00:00:00 2034",
            output.certificates[0].expiry
        );

        let timestamp = output.unsigned_attributes.timestamp_signature.as_ref().unwrap();
        assert_eq!(None, timestamp.error);
        assert!(timestamp.timestamp.as_ref().unwrap().starts_with('['));
        assert_eq!(2, timestamp.certificates.as_ref().unwrap().len());

        assert_eq!(12, output.signed_artifact.size);
    }

    #[test]
    fn test_jws_and_cose_summaries_agree() {
        let jws = serde_json::to_value(&signatures(MediaType::Jws, "", JWS_SIGNATURE).unwrap()[0])
            .unwrap();
        let cose =
            serde_json::to_value(&signatures(MediaType::Cose, "", COSE_SIGNATURE).unwrap()[0])
                .unwrap();
        for key in [
            "signedAttributes",
            "userDefinedAttributes",
            "unsignedAttributes",
            "certificates",
            "signedArtifact",
        ] {
            assert_eq!(jws[key], cose[key], "{key}");
        }
    }

    #[test]
    fn test_signing_authority_signature() {
        let outputs = signatures(MediaType::Jws, "sha256:abc", SIGNING_AUTHORITY).unwrap();
        let output = &outputs[0];
        assert_eq!(Some("sha256:abc"), output.digest.as_deref());
        assert_eq!(
            "notary.x509.signingAuthority",
            output.signed_attributes["signingScheme"]
        );
        assert_eq!(
            "Mon Jun 10 06:13:21 2024",
            output.signed_attributes["authenticSigningTime"]
        );
        assert!(!output.signed_attributes.contains_key("expiry"));
        assert!(output.unsigned_attributes.timestamp_signature.is_none());
    }

    #[test]
    fn test_signatures_media_type_mismatch() {
        assert!(signatures(MediaType::Cose, "", JWS_SIGNATURE).is_err());
        assert!(signatures(MediaType::Jws, "", COSE_SIGNATURE).is_err());
    }

    #[test]
    fn test_certificate_output() {
        let cert: Certificate = LEAF.decode().unwrap();
        let output = CertificateOutput::from(&cert);
        assert_eq!(64, output.sha256_fingerprint.len());
        assert!(
            output
                .sha256_fingerprint
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
        let json = serde_json::to_value(&output).unwrap();
        assert!(json.get("SHA256Fingerprint").is_some());
        assert!(json.get("issuedTo").is_some());
    }

    #[rstest(token, message,
        case(b"garbage".as_slice(), "invalid DER"),
        case(WIDE_ACCURACY_TOKEN, "out of the representable range"),
    )]
    fn test_timestamp_output_reports_error(token: &[u8], message: &str) {
        let output = timestamp_output(token);
        assert!(output.timestamp.is_none());
        assert!(output.certificates.is_none());
        assert!(output.error.as_deref().unwrap().contains(message));
        assert_eq!(
            vec!["error"],
            serde_json::to_value(&output)
                .unwrap()
                .as_object()
                .unwrap()
                .keys()
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_format_time() {
        let time = Utc.with_ymd_and_hms(2023, 6, 3, 22, 4, 1).unwrap();
        assert_eq!("Sat Jun  3 22:04:01 2023", format_time(time));
    }
}
