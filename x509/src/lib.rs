//! X.509 certificate summaries.
//!
//! Signature envelopes carry their signing chain as DER certificates. For
//! inspection only the identity and lifetime of each certificate matter, so
//! [`Certificate`] keeps the encoding plus the decoded subject, issuer and
//! validity, and leaves extensions and keys undecoded.
//!
//! ```asn1
//! Certificate  ::=  SEQUENCE  {
//!      tbsCertificate       TBSCertificate,
//!      signatureAlgorithm   AlgorithmIdentifier,
//!      signatureValue       BIT STRING  }
//!
//! TBSCertificate  ::=  SEQUENCE  {
//!      version         [0]  EXPLICIT Version DEFAULT v1,
//!      serialNumber         CertificateSerialNumber,
//!      signature            AlgorithmIdentifier,
//!      issuer               Name,
//!      validity             Validity,
//!      subject              Name,
//!      ... }
//! ```

use chrono::NaiveDateTime;
use inkan::decoder::{DecodableFrom, Decoder};
use inkan_der::{Tag, Tlv};
use sha2::{Digest, Sha256};

pub mod error;
pub mod name;

pub use error::{Error, Result};
pub use name::Name;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    pub not_before: NaiveDateTime,
    pub not_after: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    der: Vec<u8>,
    serial_number: Vec<u8>,
    issuer: Name,
    validity: Validity,
    subject: Name,
}

impl Certificate {
    /// The certificate exactly as it was encoded.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Big-endian serial number octets.
    pub fn serial_number(&self) -> &[u8] {
        &self.serial_number
    }

    pub fn issuer(&self) -> &Name {
        &self.issuer
    }

    pub fn subject(&self) -> &Name {
        &self.subject
    }

    pub fn validity(&self) -> &Validity {
        &self.validity
    }

    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Lowercase hex SHA-256 of the DER encoding.
    pub fn sha256_fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.der);
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }

    fn from_tlv(cert: &Tlv<'_>) -> Result<Self> {
        if cert.tag() != Tag::SEQUENCE {
            return Err(Error::InvalidCertificate(format!(
                "expected SEQUENCE, got {}",
                cert.tag()
            )));
        }
        let [tbs, _signature_algorithm, _signature_value] = cert.children()? else {
            return Err(Error::InvalidCertificate(
                "certificate must have exactly 3 elements".to_string(),
            ));
        };
        let tbs = tbs.expect(Tag::SEQUENCE)?;

        let mut fields = tbs.reader()?;
        // version [0] EXPLICIT, absent for v1
        fields.next_if(Tag::context(0, true));
        let serial_number = fields
            .next("serialNumber")?
            .expect(Tag::INTEGER)?
            .data()?
            .to_vec();
        fields.next("signature")?.expect(Tag::SEQUENCE)?;
        let issuer: Name = fields.next("issuer")?.decode()?;
        let validity = decode_validity(fields.next("validity")?)?;
        let subject: Name = fields.next("subject")?.decode()?;

        Ok(Certificate {
            der: cert.raw().to_vec(),
            serial_number,
            issuer,
            validity,
            subject,
        })
    }
}

fn decode_validity(tlv: &Tlv<'_>) -> Result<Validity> {
    let [not_before, not_after] = tlv.expect(Tag::SEQUENCE)?.children()? else {
        return Err(Error::InvalidValidity(
            "validity must hold notBefore and notAfter".to_string(),
        ));
    };
    Ok(Validity {
        not_before: not_before.time()?,
        not_after: not_after.time()?,
    })
}

impl<'a> DecodableFrom<Tlv<'a>> for Certificate {}

impl<'a> Decoder<Tlv<'a>, Certificate> for Tlv<'a> {
    type Error = Error;

    fn decode(&self) -> Result<Certificate> {
        Certificate::from_tlv(self)
    }
}

impl DecodableFrom<&[u8]> for Certificate {}

impl Decoder<&[u8], Certificate> for &[u8] {
    type Error = Error;

    fn decode(&self) -> Result<Certificate> {
        let tlv: Tlv = self.decode()?;
        Certificate::from_tlv(&tlv)
    }
}
