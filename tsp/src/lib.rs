//! RFC 3161 timestamp tokens.
//!
//! Notary signatures may carry a timestamp countersignature: a CMS
//! `ContentInfo` whose `SignedData` encapsulates a `TSTInfo`. This crate reads
//! the time and accuracy asserted by the TSA and the certificates it bundled.
//! The CMS signature itself is not verified.
//!
//! ```asn1
//! TSTInfo ::= SEQUENCE  {
//!    version                      INTEGER  { v1(1) },
//!    policy                       TSAPolicyId,
//!    messageImprint               MessageImprint,
//!    serialNumber                 INTEGER,
//!    genTime                      GeneralizedTime,
//!    accuracy                     Accuracy                 OPTIONAL,
//!    ordering                     BOOLEAN             DEFAULT FALSE,
//!    nonce                        INTEGER                  OPTIONAL,
//!    tsa                          [0] GeneralName          OPTIONAL,
//!    extensions                   [1] IMPLICIT Extensions  OPTIONAL  }
//!
//! Accuracy ::= SEQUENCE {
//!    seconds        INTEGER              OPTIONAL,
//!    millis     [0] INTEGER  (1..999)    OPTIONAL,
//!    micros     [1] INTEGER  (1..999)    OPTIONAL  }
//! ```

use chrono::{NaiveDateTime, TimeDelta};
use inkan::decoder::{DecodableFrom, Decoder};
use inkan_der::{ObjectIdentifier, Tag, Tlv};
use inkan_x509::Certificate;

pub mod error;

pub use error::{Error, Result};

pub const OID_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";
pub const OID_TST_INFO: &str = "1.2.840.113549.1.9.16.1.4";

/// Accuracy assumed when the token does not state one.
pub const DEFAULT_ACCURACY: TimeDelta = TimeDelta::seconds(1);

#[derive(Debug, Clone)]
pub struct TimestampToken {
    policy: ObjectIdentifier,
    gen_time: NaiveDateTime,
    accuracy: TimeDelta,
    range: (NaiveDateTime, NaiveDateTime),
    certificates: Vec<Certificate>,
}

impl TimestampToken {
    pub fn policy(&self) -> &ObjectIdentifier {
        &self.policy
    }

    pub fn gen_time(&self) -> NaiveDateTime {
        self.gen_time
    }

    pub fn accuracy(&self) -> TimeDelta {
        self.accuracy
    }

    /// Earliest and latest instants the token vouches for.
    pub fn range(&self) -> (NaiveDateTime, NaiveDateTime) {
        self.range
    }

    /// Certificates bundled in the SignedData, in encoded order.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    fn from_content_info(content_info: &Tlv<'_>) -> Result<Self> {
        let mut fields = content_info.expect(Tag::SEQUENCE)?.reader()?;
        let content_type = fields.next("contentType")?.oid()?;
        if content_type != OID_SIGNED_DATA {
            return Err(Error::NotSignedData(content_type.to_string()));
        }
        let content = fields.next("content")?.expect(Tag::context(0, true))?;
        let [signed_data] = content.children()? else {
            return Err(inkan_der::Error::MissingElement("signedData").into());
        };

        let mut fields = signed_data.expect(Tag::SEQUENCE)?.reader()?;
        fields.next("version")?.expect(Tag::INTEGER)?;
        fields.next("digestAlgorithms")?.expect(Tag::SET)?;
        let encap = fields.next("encapContentInfo")?;
        let certificates = match fields.next_if(Tag::context(0, true)) {
            Some(set) => decode_certificates(set)?,
            None => Vec::new(),
        };

        let mut encap = encap.expect(Tag::SEQUENCE)?.reader()?;
        let econtent_type = encap.next("eContentType")?.oid()?;
        if econtent_type != OID_TST_INFO {
            return Err(Error::NotTstInfo(econtent_type.to_string()));
        }
        let [octets] = encap
            .next("eContent")?
            .expect(Tag::context(0, true))?
            .children()?
        else {
            return Err(inkan_der::Error::MissingElement("eContent").into());
        };
        let tst_info: Tlv = octets.expect(Tag::OCTET_STRING)?.data()?.decode()?;

        let mut fields = tst_info.expect(Tag::SEQUENCE)?.reader()?;
        let version = fields.next("version")?.u64()?;
        if version != 1 {
            return Err(Error::UnsupportedVersion(version));
        }
        let policy = fields.next("policy")?.oid()?;
        fields.next("messageImprint")?.expect(Tag::SEQUENCE)?;
        fields.next("serialNumber")?.expect(Tag::INTEGER)?;
        let gen_time = fields
            .next("genTime")?
            .expect(Tag::GENERALIZED_TIME)?
            .time()?;
        let accuracy = match fields.next_if(Tag::SEQUENCE) {
            Some(accuracy) => decode_accuracy(accuracy)?,
            None => DEFAULT_ACCURACY,
        };
        let range = time_range(gen_time, accuracy)?;

        Ok(TimestampToken {
            policy,
            gen_time,
            accuracy,
            range,
            certificates,
        })
    }
}

/// `CertificateSet`; attribute certificates and other choices are skipped.
fn decode_certificates(set: &Tlv<'_>) -> Result<Vec<Certificate>> {
    set.children()?
        .iter()
        .filter(|choice| choice.tag() == Tag::SEQUENCE)
        .map(|cert| -> Result<Certificate> { Ok(cert.decode()?) })
        .collect()
}

fn decode_accuracy(accuracy: &Tlv<'_>) -> Result<TimeDelta> {
    let mut fields = accuracy.reader()?;
    let seconds = match fields.next_if(Tag::INTEGER) {
        Some(n) => n.u64()?,
        None => 0,
    };
    let millis = match fields.next_if(Tag::context(0, false)) {
        Some(n) => n.u64()?,
        None => 0,
    };
    let micros = match fields.next_if(Tag::context(1, false)) {
        Some(n) => n.u64()?,
        None => 0,
    };
    if millis > 999 {
        return Err(Error::InvalidAccuracy("millis"));
    }
    if micros > 999 {
        return Err(Error::InvalidAccuracy("micros"));
    }
    let seconds = i64::try_from(seconds)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .ok_or(Error::InvalidAccuracy("seconds"))?;
    Ok(seconds + TimeDelta::milliseconds(millis as i64) + TimeDelta::microseconds(micros as i64))
}

/// `gen_time ± accuracy`; both ends must be representable.
fn time_range(gen_time: NaiveDateTime, accuracy: TimeDelta) -> Result<(NaiveDateTime, NaiveDateTime)> {
    let earliest = gen_time
        .checked_sub_signed(accuracy)
        .ok_or(Error::TimeOutOfRange)?;
    let latest = gen_time
        .checked_add_signed(accuracy)
        .ok_or(Error::TimeOutOfRange)?;
    Ok((earliest, latest))
}

impl<'a> DecodableFrom<Tlv<'a>> for TimestampToken {}

impl<'a> Decoder<Tlv<'a>, TimestampToken> for Tlv<'a> {
    type Error = Error;

    fn decode(&self) -> Result<TimestampToken> {
        TimestampToken::from_content_info(self)
    }
}

impl DecodableFrom<&[u8]> for TimestampToken {}

impl Decoder<&[u8], TimestampToken> for &[u8] {
    type Error = Error;

    fn decode(&self) -> Result<TimestampToken> {
        let tlv: Tlv = self.decode()?;
        TimestampToken::from_content_info(&tlv)
    }
}

#[cfg(test)]
mod tests {
    use inkan::decoder::Decoder;
    use rstest::rstest;

    use super::*;

    const TOKEN: &[u8] = include_bytes!("../../testdata/tsa/token.der");
    const WIDE_ACCURACY_TOKEN: &[u8] = include_bytes!("../../testdata/tsa/wide-accuracy.der");

    #[test]
    fn test_decode_openssl_token() {
        let token: TimestampToken = TOKEN.decode().unwrap();
        assert_eq!("1.2.3.4.1", token.policy().to_string());
        assert_eq!(TimeDelta::milliseconds(1500), token.accuracy());
        let (earliest, latest) = token.range();
        assert_eq!(TimeDelta::seconds(3), latest - earliest);
        assert_eq!(token.gen_time(), earliest + token.accuracy());

        let subjects = token
            .certificates()
            .iter()
            .map(|cert| cert.subject().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            vec![
                "CN=Inkan Test TSA,O=Inkan Test,C=US",
                "CN=Inkan Test Root,O=Inkan Test,C=US",
            ],
            subjects
        );
    }

    #[test]
    fn test_decode_rejects_other_content_type() {
        // SEQUENCE { OID 1.2.840.113549.1.7.1 (data), [0] { OCTET STRING } }
        let input: &[u8] = &[
            0x30, 0x11, 0x06, 0x09, 0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01, 0xa0,
            0x04, 0x04, 0x02, 0x00, 0x00,
        ];
        let result: Result<TimestampToken> = input.decode();
        assert!(matches!(result, Err(Error::NotSignedData(oid)) if oid == "1.2.840.113549.1.7.1"));
    }

    #[test]
    fn test_decode_rejects_unrepresentable_range() {
        // accuracy of 2^50 seconds
        let result: Result<TimestampToken> = WIDE_ACCURACY_TOKEN.decode();
        assert!(matches!(result, Err(Error::TimeOutOfRange)));
    }

    #[rstest(gen_time, accuracy, ok,
        case(NaiveDateTime::MIN, TimeDelta::zero(), true),
        case(NaiveDateTime::MAX, TimeDelta::seconds(1), false),
        case(NaiveDateTime::MIN, TimeDelta::seconds(1), false),
        case(NaiveDateTime::UNIX_EPOCH, TimeDelta::seconds(1 << 50), false),
        case(NaiveDateTime::UNIX_EPOCH, TimeDelta::milliseconds(1500), true),
    )]
    fn test_time_range(gen_time: NaiveDateTime, accuracy: TimeDelta, ok: bool) {
        match time_range(gen_time, accuracy) {
            Ok((earliest, latest)) => {
                assert!(ok);
                assert_eq!(accuracy * 2, latest - earliest);
            }
            Err(e) => {
                assert!(!ok);
                assert!(matches!(e, Error::TimeOutOfRange));
            }
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let result: Result<TimestampToken> = (&b"not a token"[..]).decode();
        assert!(matches!(result, Err(Error::Der(_))));
    }

    #[rstest(input, expected,
        case(vec![0x30, 0x03, 0x02, 0x01, 0x02], TimeDelta::seconds(2)),
        case(vec![0x30, 0x04, 0x80, 0x02, 0x01, 0xf4], TimeDelta::milliseconds(500)),
        case(vec![0x30, 0x06, 0x02, 0x01, 0x01, 0x81, 0x01, 0x0a], TimeDelta::microseconds(1_000_010)),
        case(vec![0x30, 0x00], TimeDelta::zero()),
    )]
    fn test_decode_accuracy(input: Vec<u8>, expected: TimeDelta) {
        let tlv: Tlv = input.as_slice().decode().unwrap();
        assert_eq!(expected, decode_accuracy(&tlv).unwrap());
    }

    #[test]
    fn test_decode_accuracy_millis_out_of_range() {
        let input: &[u8] = &[0x30, 0x04, 0x80, 0x02, 0x03, 0xe8];
        let tlv: Tlv = input.decode().unwrap();
        assert!(matches!(
            decode_accuracy(&tlv),
            Err(Error::InvalidAccuracy("millis"))
        ));
    }
}
