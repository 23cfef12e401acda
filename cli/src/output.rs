use std::io::Write;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::inspect::{CertificateOutput, InspectOutput, SignatureOutput};
use crate::tree::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Human-readable tree
    #[value(alias = "text")]
    Plaintext,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        <Self as clap::ValueEnum>::from_str(s, false)
            .map_err(|_| Error::UnrecognizedOutputFormat(s.to_string()))
    }
}

/// Signed attributes shown first in plaintext, in this order.
const SIGNED_ATTRIBUTE_LABELS: [(&str, &str); 5] = [
    ("contentType", "content type"),
    ("signingScheme", "signing scheme"),
    ("signingTime", "signing time"),
    ("authenticSigningTime", "authentic signing time"),
    ("expiry", "expiry"),
];

const EMPTY: &str = "(empty)";

/// Writes `output` to `writer`. Plaintext is a tree rooted at `path`.
pub(crate) fn print(
    format: OutputFormat,
    path: &str,
    output: &InspectOutput,
    writer: &mut impl Write,
) -> Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *writer, output)?;
            writeln!(writer)?;
        }
        OutputFormat::Plaintext => {
            write!(writer, "{}", signature_tree(path, output))?;
        }
    }
    writer.flush()?;
    Ok(())
}

fn signature_tree(path: &str, output: &InspectOutput) -> Node {
    let mut root = Node::new(path);
    for signature in &output.signatures {
        add_signature(&mut root, signature);
    }
    root
}

fn add_signature(root: &mut Node, signature: &SignatureOutput) {
    if let Some(digest) = &signature.digest {
        root.add_pair("digest", digest);
    }
    root.add_pair("signature algorithm", &signature.signature_algorithm);
    root.add_pair("signature envelope type", &signature.media_type);

    let signed = root.add("signed attributes");
    for (key, label) in SIGNED_ATTRIBUTE_LABELS {
        if let Some(value) = signature.signed_attributes.get(key) {
            signed.add_pair(label, value);
        }
    }
    for (key, value) in &signature.signed_attributes {
        if !SIGNED_ATTRIBUTE_LABELS.iter().any(|(k, _)| k == key) {
            signed.add_pair(key, value);
        }
    }

    let user_defined = root.add("user defined attributes");
    if signature.user_defined_attributes.is_empty() {
        user_defined.add(EMPTY);
    }
    for (key, value) in &signature.user_defined_attributes {
        user_defined.add_pair(key, value);
    }

    let unsigned = root.add("unsigned attributes");
    let attributes = &signature.unsigned_attributes;
    if attributes.signing_agent.is_none() && attributes.timestamp_signature.is_none() {
        unsigned.add(EMPTY);
    }
    if let Some(agent) = &attributes.signing_agent {
        unsigned.add_pair("signing agent", agent);
    }
    if let Some(timestamp) = &attributes.timestamp_signature {
        let node = unsigned.add("timestamp signature");
        if let Some(error) = &timestamp.error {
            node.add_pair("error", error);
        }
        if let Some(time) = &timestamp.timestamp {
            node.add_pair("timestamp", time);
        }
        if let Some(certificates) = &timestamp.certificates {
            add_certificates(node, certificates);
        }
    }

    add_certificates(root, &signature.certificates);

    let artifact = root.add("signed artifact");
    artifact.add_pair("media type", &signature.signed_artifact.media_type);
    artifact.add_pair("digest", &signature.signed_artifact.digest);
    artifact.add_pair("size", signature.signed_artifact.size);
}

fn add_certificates(parent: &mut Node, certificates: &[CertificateOutput]) {
    let node = parent.add("certificates");
    if certificates.is_empty() {
        node.add(EMPTY);
    }
    for cert in certificates {
        let entry = node.add_pair("SHA256 fingerprint", &cert.sha256_fingerprint);
        entry.add_pair("issued to", &cert.issued_to);
        entry.add_pair("issued by", &cert.issued_by);
        entry.add_pair("expiry", &cert.expiry);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use inkan_envelope::Descriptor;
    use rstest::rstest;

    use super::*;
    use crate::inspect::{TimestampOutput, UnsignedAttributesOutput};

    fn inspect_output() -> InspectOutput {
        InspectOutput {
            media_type: "application/jose+json".to_string(),
            signatures: vec![SignatureOutput {
                media_type: "application/jose+json".to_string(),
                digest: None,
                signature_algorithm: "RSASSA-PSS-SHA-384".to_string(),
                signed_attributes: BTreeMap::from([
                    ("buildId".to_string(), "42".to_string()),
                    (
                        "contentType".to_string(),
                        "application/vnd.cncf.notary.payload.v1+json".to_string(),
                    ),
                    ("signingScheme".to_string(), "notary.x509".to_string()),
                    (
                        "signingTime".to_string(),
                        "Fri Jun 23 22:04:01 2023".to_string(),
                    ),
                ]),
                user_defined_attributes: BTreeMap::new(),
                unsigned_attributes: UnsignedAttributesOutput {
                    signing_agent: Some("inkan/0.0.1".to_string()),
                    timestamp_signature: Some(TimestampOutput {
                        error: Some("bad token".to_string()),
                        ..Default::default()
                    }),
                },
                certificates: vec![CertificateOutput {
                    sha256_fingerprint: "ab12".to_string(),
                    issued_to: "CN=signer".to_string(),
                    issued_by: "CN=root".to_string(),
                    expiry: "Sun Jan  1 00:00:00 2034".to_string(),
                }],
                signed_artifact: Descriptor {
                    media_type: "application/octet-stream".to_string(),
                    digest: "sha256:00".to_string(),
                    size: 12,
                    annotations: None,
                },
            }],
        }
    }

    fn render(format: OutputFormat) -> String {
        let mut out = Vec::new();
        print(format, "blob.jws.sig", &inspect_output(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[rstest(input, expected,
        case("json", OutputFormat::Json),
        case("plaintext", OutputFormat::Plaintext),
        case("text", OutputFormat::Plaintext),
    )]
    fn test_output_format_from_str(input: &str, expected: OutputFormat) {
        assert_eq!(expected, input.parse::<OutputFormat>().unwrap());
    }

    #[test]
    fn test_output_format_names() {
        let names = <OutputFormat as clap::ValueEnum>::value_variants()
            .iter()
            .filter_map(clap::ValueEnum::to_possible_value)
            .map(|v| v.get_name().to_string())
            .collect::<Vec<_>>();
        assert_eq!(vec!["json", "plaintext"], names);
    }

    #[rstest(input, case("yaml"), case("JSON"), case(""))]
    fn test_output_format_unrecognized(input: &str) {
        let err = input.parse::<OutputFormat>().unwrap_err();
        assert_eq!(format!("unrecognized output format {input}"), err.to_string());
    }

    #[test]
    fn test_print_plaintext() {
        let expected = "\
blob.jws.sig
├── signature algorithm: RSASSA-PSS-SHA-384
├── signature envelope type: application/jose+json
├── signed attributes
│   ├── content type: application/vnd.cncf.notary.payload.v1+json
│   ├── signing scheme: notary.x509
│   ├── signing time: Fri Jun 23 22:04:01 2023
│   └── buildId: 42
├── user defined attributes
│   └── (empty)
├── unsigned attributes
│   ├── signing agent: inkan/0.0.1
│   └── timestamp signature
│       └── error: bad token
├── certificates
│   └── SHA256 fingerprint: ab12
│       ├── issued to: CN=signer
│       ├── issued by: CN=root
│       └── expiry: Sun Jan  1 00:00:00 2034
└── signed artifact
    ├── media type: application/octet-stream
    ├── digest: sha256:00
    └── size: 12
";
        assert_eq!(expected, render(OutputFormat::Plaintext));
    }

    #[test]
    fn test_print_json() {
        let json: serde_json::Value = serde_json::from_str(&render(OutputFormat::Json)).unwrap();
        assert_eq!("application/jose+json", json["mediaType"]);
        let signature = &json["signatures"][0];
        assert!(signature.get("digest").is_none());
        assert_eq!("42", signature["signedAttributes"]["buildId"]);
        assert_eq!(serde_json::json!({}), signature["userDefinedAttributes"]);
        assert_eq!(
            "bad token",
            signature["unsignedAttributes"]["timestampSignature"]["error"]
        );
        assert_eq!("ab12", signature["certificates"][0]["SHA256Fingerprint"]);
        assert_eq!(12, signature["signedArtifact"]["size"]);
        assert!(signature["signedArtifact"].get("annotations").is_none());
    }
}
