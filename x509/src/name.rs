//! Distinguished names
//!
//! Defined in RFC 5280 Section 4.1.2.4
//!
//! ```asn1
//! Name ::= CHOICE { -- only one possibility for now --
//!     rdnSequence  RDNSequence
//! }
//!
//! RDNSequence ::= SEQUENCE OF RelativeDistinguishedName
//!
//! RelativeDistinguishedName ::= SET OF AttributeTypeAndValue
//!
//! AttributeTypeAndValue ::= SEQUENCE {
//!     type     AttributeType,
//!     value    AttributeValue
//! }
//! ```

use std::fmt;

use inkan::decoder::{DecodableFrom, Decoder};
use inkan_der::{ObjectIdentifier, Tag, Tlv};

use crate::error::{Error, Result};

/// X.509 Distinguished Name.
///
/// `Display` renders the RFC 2253 string form: the RDN sequence in reverse
/// order, comma separated, e.g. `CN=signer,O=Example,C=US`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name {
    rdn_sequence: Vec<RelativeDistinguishedName>,
}

impl Name {
    pub fn new(rdn_sequence: Vec<RelativeDistinguishedName>) -> Self {
        Self { rdn_sequence }
    }

    pub fn rdn_sequence(&self) -> &[RelativeDistinguishedName] {
        &self.rdn_sequence
    }

    /// Value of the first commonName attribute, if any.
    pub fn common_name(&self) -> Option<&str> {
        self.rdn_sequence
            .iter()
            .flat_map(|rdn| rdn.attributes.iter())
            .find(|attr| attr.attribute_type == AttributeTypeAndValue::OID_COMMON_NAME)
            .and_then(|attr| match &attr.attribute_value {
                AttributeValue::Text(s) => Some(s.as_str()),
                AttributeValue::Raw(_) => None,
            })
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self
            .rdn_sequence
            .iter()
            .rev()
            .map(|rdn| {
                rdn.attributes
                    .iter()
                    .map(|attr| attr.to_string())
                    .collect::<Vec<_>>()
                    .join("+")
            })
            .collect::<Vec<_>>()
            .join(",");
        write!(f, "{}", formatted)
    }
}

impl<'a> DecodableFrom<Tlv<'a>> for Name {}

impl<'a> Decoder<Tlv<'a>, Name> for Tlv<'a> {
    type Error = Error;

    fn decode(&self) -> Result<Name> {
        if self.tag() != Tag::SEQUENCE {
            return Err(Error::InvalidName(format!("expected SEQUENCE, got {}", self.tag())));
        }
        let rdn_sequence = self
            .children()?
            .iter()
            .map(|elem| elem.decode())
            .collect::<Result<Vec<RelativeDistinguishedName>>>()?;
        Ok(Name { rdn_sequence })
    }
}

/// One component of a Name; usually a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeDistinguishedName {
    attributes: Vec<AttributeTypeAndValue>,
}

impl RelativeDistinguishedName {
    pub fn new(attributes: Vec<AttributeTypeAndValue>) -> Self {
        Self { attributes }
    }

    pub fn attributes(&self) -> &[AttributeTypeAndValue] {
        &self.attributes
    }
}

impl<'a> DecodableFrom<Tlv<'a>> for RelativeDistinguishedName {}

impl<'a> Decoder<Tlv<'a>, RelativeDistinguishedName> for Tlv<'a> {
    type Error = Error;

    fn decode(&self) -> Result<RelativeDistinguishedName> {
        if self.tag() != Tag::SET {
            return Err(Error::InvalidName(format!(
                "relative distinguished name must be a SET, got {}",
                self.tag()
            )));
        }
        let attributes = self
            .children()?
            .iter()
            .map(|elem| elem.decode())
            .collect::<Result<Vec<AttributeTypeAndValue>>>()?;
        Ok(RelativeDistinguishedName { attributes })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    /// Encoding of a value that is not a directory string.
    Raw(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTypeAndValue {
    attribute_type: ObjectIdentifier,
    attribute_value: AttributeValue,
}

impl AttributeTypeAndValue {
    pub const OID_COMMON_NAME: &'static str = "2.5.4.3";
    pub const OID_SERIAL_NUMBER: &'static str = "2.5.4.5";
    pub const OID_COUNTRY_NAME: &'static str = "2.5.4.6";
    pub const OID_LOCALITY_NAME: &'static str = "2.5.4.7";
    pub const OID_STATE_OR_PROVINCE_NAME: &'static str = "2.5.4.8";
    pub const OID_STREET_ADDRESS: &'static str = "2.5.4.9";
    pub const OID_ORGANIZATION_NAME: &'static str = "2.5.4.10";
    pub const OID_ORGANIZATIONAL_UNIT_NAME: &'static str = "2.5.4.11";
    pub const OID_POSTAL_CODE: &'static str = "2.5.4.17";

    pub fn new(attribute_type: ObjectIdentifier, attribute_value: AttributeValue) -> Self {
        Self {
            attribute_type,
            attribute_value,
        }
    }

    pub fn attribute_type(&self) -> &ObjectIdentifier {
        &self.attribute_type
    }

    pub fn attribute_value(&self) -> &AttributeValue {
        &self.attribute_value
    }

    /// Short name used in the string form of a Name.
    pub fn short_name(&self) -> Option<&'static str> {
        match self.attribute_type.to_string().as_str() {
            Self::OID_COMMON_NAME => Some("CN"),
            Self::OID_SERIAL_NUMBER => Some("SERIALNUMBER"),
            Self::OID_COUNTRY_NAME => Some("C"),
            Self::OID_LOCALITY_NAME => Some("L"),
            Self::OID_STATE_OR_PROVINCE_NAME => Some("ST"),
            Self::OID_STREET_ADDRESS => Some("STREET"),
            Self::OID_ORGANIZATION_NAME => Some("O"),
            Self::OID_ORGANIZATIONAL_UNIT_NAME => Some("OU"),
            Self::OID_POSTAL_CODE => Some("POSTALCODE"),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeTypeAndValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = self
            .short_name()
            .map(str::to_string)
            .unwrap_or_else(|| self.attribute_type.to_string());
        match &self.attribute_value {
            AttributeValue::Text(s) => write!(f, "{}={}", key, escape(s)),
            AttributeValue::Raw(der) => {
                let hex = der.iter().map(|b| format!("{:02x}", b)).collect::<String>();
                write!(f, "{}=#{}", key, hex)
            }
        }
    }
}

impl<'a> DecodableFrom<Tlv<'a>> for AttributeTypeAndValue {}

impl<'a> Decoder<Tlv<'a>, AttributeTypeAndValue> for Tlv<'a> {
    type Error = Error;

    fn decode(&self) -> Result<AttributeTypeAndValue> {
        let [attribute_type, value] = self.children()? else {
            return Err(Error::InvalidName(
                "attribute must hold a type and a value".to_string(),
            ));
        };
        let attribute_type = attribute_type.oid()?;
        let attribute_value = match value.string() {
            Ok(s) => AttributeValue::Text(s),
            Err(_) => AttributeValue::Raw(value.raw().to_vec()),
        };
        Ok(AttributeTypeAndValue {
            attribute_type,
            attribute_value,
        })
    }
}

/// RFC 2253 section 2.4 escaping.
fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let last = value.chars().count().saturating_sub(1);
    for (i, c) in value.chars().enumerate() {
        let special = matches!(c, ',' | '+' | '"' | '\\' | '<' | '>' | ';')
            || (i == 0 && (c == ' ' || c == '#'))
            || (i == last && c == ' ');
        if special {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
