//! Minimal DER reader.
//!
//! Parses a DER byte string into a tree of [`Tlv`] nodes that borrow from the
//! input. Constructed values are parsed recursively; primitive values keep
//! their content octets. Typed accessors turn primitive nodes into integers,
//! object identifiers, strings and times.
//!
//! Only definite lengths and low tag numbers (0-30) are accepted, which is
//! everything X.509 certificates and RFC 3161 tokens use.

use std::fmt::{self, Display, Formatter};

use chrono::{NaiveDateTime, TimeDelta};
use inkan::decoder::{DecodableFrom, Decoder};
use nom::{IResult, Parser};

pub mod error;

pub use error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Class {
    Universal,
    Application,
    ContextSpecific,
    Private,
}

impl From<u8> for Class {
    fn from(value: u8) -> Self {
        match value >> 6 {
            0 => Class::Universal,
            1 => Class::Application,
            2 => Class::ContextSpecific,
            _ => Class::Private,
        }
    }
}

/// Identifier octet of a DER element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag {
    class: Class,
    constructed: bool,
    number: u8,
}

impl Tag {
    pub const BOOLEAN: Tag = Tag::universal(0x01, false);
    pub const INTEGER: Tag = Tag::universal(0x02, false);
    pub const BIT_STRING: Tag = Tag::universal(0x03, false);
    pub const OCTET_STRING: Tag = Tag::universal(0x04, false);
    pub const NULL: Tag = Tag::universal(0x05, false);
    pub const OBJECT_IDENTIFIER: Tag = Tag::universal(0x06, false);
    pub const UTF8_STRING: Tag = Tag::universal(0x0c, false);
    pub const SEQUENCE: Tag = Tag::universal(0x10, true);
    pub const SET: Tag = Tag::universal(0x11, true);
    pub const PRINTABLE_STRING: Tag = Tag::universal(0x13, false);
    pub const T61_STRING: Tag = Tag::universal(0x14, false);
    pub const IA5_STRING: Tag = Tag::universal(0x16, false);
    pub const UTC_TIME: Tag = Tag::universal(0x17, false);
    pub const GENERALIZED_TIME: Tag = Tag::universal(0x18, false);
    pub const VISIBLE_STRING: Tag = Tag::universal(0x1a, false);
    pub const BMP_STRING: Tag = Tag::universal(0x1e, false);

    const fn universal(number: u8, constructed: bool) -> Tag {
        Tag {
            class: Class::Universal,
            constructed,
            number,
        }
    }

    /// Context-specific tag `[number]`.
    pub const fn context(number: u8, constructed: bool) -> Tag {
        Tag {
            class: Class::ContextSpecific,
            constructed,
            number,
        }
    }

    pub fn class(&self) -> Class {
        self.class
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    fn from_octet(octet: u8) -> Result<Tag> {
        let number = octet & 0x1f;
        if number == 0x1f {
            return Err(Error::HighTagNumber);
        }
        Ok(Tag {
            class: Class::from(octet),
            constructed: octet & 0x20 == 0x20,
            number,
        })
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.class {
            Class::Universal => {
                let name = match self.number {
                    0x01 => "BOOLEAN",
                    0x02 => "INTEGER",
                    0x03 => "BIT STRING",
                    0x04 => "OCTET STRING",
                    0x05 => "NULL",
                    0x06 => "OBJECT IDENTIFIER",
                    0x0c => "UTF8String",
                    0x10 => "SEQUENCE",
                    0x11 => "SET",
                    0x13 => "PrintableString",
                    0x14 => "T61String",
                    0x16 => "IA5String",
                    0x17 => "UTCTime",
                    0x18 => "GeneralizedTime",
                    0x1a => "VisibleString",
                    0x1e => "BMPString",
                    n => return write!(f, "UNIVERSAL {}", n),
                };
                write!(f, "{}", name)
            }
            Class::Application => write!(f, "APPLICATION {}", self.number),
            Class::ContextSpecific => write!(f, "[{}]", self.number),
            Class::Private => write!(f, "PRIVATE {}", self.number),
        }
    }
}

/// Dotted-decimal object identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier(Vec<u64>);

impl ObjectIdentifier {
    pub fn arcs(&self) -> &[u64] {
        &self.0
    }

    fn from_der(data: &[u8]) -> Result<Self> {
        let mut arcs = Vec::new();
        let mut acc: u64 = 0;
        let mut pending = false;
        for &b in data {
            if acc > (u64::MAX >> 7) {
                return Err(Error::InvalidObjectIdentifier);
            }
            acc = (acc << 7) | (b & 0x7f) as u64;
            pending = b & 0x80 == 0x80;
            if pending {
                continue;
            }
            if arcs.is_empty() {
                let first = (acc / 40).min(2);
                arcs.push(first);
                arcs.push(acc - first * 40);
            } else {
                arcs.push(acc);
            }
            acc = 0;
        }
        if pending || arcs.is_empty() {
            return Err(Error::InvalidObjectIdentifier);
        }
        Ok(ObjectIdentifier(arcs))
    }
}

impl Display for ObjectIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let dotted = self
            .0
            .iter()
            .map(|arc| arc.to_string())
            .collect::<Vec<_>>()
            .join(".");
        write!(f, "{}", dotted)
    }
}

impl PartialEq<&str> for ObjectIdentifier {
    fn eq(&self, other: &&str) -> bool {
        self.to_string() == *other
    }
}

/// Deepest constructed nesting accepted by [`Tlv::parse`].
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value<'a> {
    Tlv(Vec<Tlv<'a>>),
    Data(&'a [u8]),
}

/// A parsed DER element borrowing from its encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv<'a> {
    tag: Tag,
    raw: &'a [u8],
    value: Value<'a>,
}

impl<'a> Tlv<'a> {
    /// Parses one element from the front of `input`, returning the rest.
    pub fn parse(input: &'a [u8]) -> Result<(&'a [u8], Tlv<'a>)> {
        Self::parse_nested(input, 0)
    }

    fn parse_nested(input: &'a [u8], depth: usize) -> Result<(&'a [u8], Tlv<'a>)> {
        if depth > MAX_DEPTH {
            return Err(Error::TooDeep(MAX_DEPTH));
        }
        let start = input;
        let (input, octet) = parse_tag(input)?;
        let tag = Tag::from_octet(octet)?;
        let (input, length) = parse_length(input)?;
        let (input, data) = take_bytes(input, length)?;
        let raw = &start[..start.len() - input.len()];

        if tag.constructed {
            // parse TLV recursively.
            let mut tlvs = Vec::new();
            let mut data = data;
            while !data.is_empty() {
                let (rest, v) = Self::parse_nested(data, depth + 1)?;
                data = rest;
                tlvs.push(v);
            }
            return Ok((
                input,
                Tlv {
                    tag,
                    raw,
                    value: Value::Tlv(tlvs),
                },
            ));
        }

        Ok((
            input,
            Tlv {
                tag,
                raw,
                value: Value::Data(data),
            },
        ))
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    /// The complete encoding of this element, header included.
    pub fn raw(&self) -> &'a [u8] {
        self.raw
    }

    pub fn value(&self) -> &Value<'a> {
        &self.value
    }

    /// Content octets of a primitive element.
    pub fn data(&self) -> Result<&'a [u8]> {
        match self.value {
            Value::Data(data) => Ok(data),
            Value::Tlv(_) => Err(Error::ExpectedPrimitive(self.tag)),
        }
    }

    /// Child elements of a constructed element.
    pub fn children(&self) -> Result<&[Tlv<'a>]> {
        match &self.value {
            Value::Tlv(children) => Ok(children),
            Value::Data(_) => Err(Error::ExpectedConstructed(self.tag)),
        }
    }

    /// Cursor over the children of a constructed element.
    pub fn reader(&self) -> Result<Reader<'_, 'a>> {
        Ok(Reader::new(self.children()?))
    }

    pub fn expect(&self, tag: Tag) -> Result<&Self> {
        if self.tag != tag {
            return Err(Error::UnexpectedTag {
                expected: tag,
                actual: self.tag,
            });
        }
        Ok(self)
    }

    pub fn oid(&self) -> Result<ObjectIdentifier> {
        ObjectIdentifier::from_der(self.expect(Tag::OBJECT_IDENTIFIER)?.data()?)
    }

    /// Non-negative INTEGER that fits in a `u64`.
    pub fn u64(&self) -> Result<u64> {
        let data = self.data()?;
        if data.is_empty() {
            return Err(Error::InvalidInteger);
        }
        if data[0] & 0x80 == 0x80 {
            return Err(Error::IntegerOutOfRange);
        }
        let digits = match data.iter().position(|&b| b != 0) {
            Some(i) => &data[i..],
            None => return Ok(0),
        };
        if digits.len() > 8 {
            return Err(Error::IntegerOutOfRange);
        }
        Ok(digits.iter().fold(0u64, |n, &b| (n << 8) | b as u64))
    }

    /// Any of the character string types used in distinguished names.
    pub fn string(&self) -> Result<String> {
        let data = self.data()?;
        let invalid = || Error::InvalidString(self.tag);
        match self.tag {
            Tag::UTF8_STRING => String::from_utf8(data.to_vec()).map_err(|_| invalid()),
            Tag::PRINTABLE_STRING | Tag::IA5_STRING | Tag::VISIBLE_STRING => {
                if !data.is_ascii() {
                    return Err(invalid());
                }
                Ok(data.iter().map(|&b| b as char).collect())
            }
            // Treated as Latin-1, which is what issuers put there in practice.
            Tag::T61_STRING => Ok(data.iter().map(|&b| b as char).collect()),
            Tag::BMP_STRING => {
                if data.len() % 2 != 0 {
                    return Err(invalid());
                }
                let units = data
                    .chunks(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect::<Vec<_>>();
                String::from_utf16(&units).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }

    /// UTCTime or GeneralizedTime, interpreted as UTC.
    pub fn time(&self) -> Result<NaiveDateTime> {
        let data = self.data()?;
        let text = std::str::from_utf8(data).map_err(|_| Error::InvalidTime(format!("{:?}", data)))?;
        match self.tag {
            Tag::UTC_TIME => parse_utc_time(text),
            Tag::GENERALIZED_TIME => parse_generalized_time(text),
            actual => Err(Error::UnexpectedTag {
                expected: Tag::UTC_TIME,
                actual,
            }),
        }
    }
}

impl<'a> DecodableFrom<&'a [u8]> for Tlv<'a> {}

impl<'a> Decoder<&'a [u8], Tlv<'a>> for &'a [u8] {
    type Error = Error;

    /// Parses exactly one element; trailing bytes are an error.
    fn decode(&self) -> Result<Tlv<'a>> {
        let (rest, tlv) = Tlv::parse(*self)?;
        if !rest.is_empty() {
            return Err(Error::TrailingData(rest.len()));
        }
        Ok(tlv)
    }
}

/// Sequential access to the children of a SEQUENCE, with support for
/// OPTIONAL and tagged fields.
#[derive(Debug, Clone)]
pub struct Reader<'b, 'a> {
    items: &'b [Tlv<'a>],
    pos: usize,
}

impl<'b, 'a> Reader<'b, 'a> {
    pub fn new(items: &'b [Tlv<'a>]) -> Self {
        Reader { items, pos: 0 }
    }

    /// Next element, which must exist.
    pub fn next(&mut self, name: &'static str) -> Result<&'b Tlv<'a>> {
        let item = self.items.get(self.pos).ok_or(Error::MissingElement(name))?;
        self.pos += 1;
        Ok(item)
    }

    /// Next element if it carries `tag`.
    pub fn next_if(&mut self, tag: Tag) -> Option<&'b Tlv<'a>> {
        let item = self.items.get(self.pos).filter(|item| item.tag == tag)?;
        self.pos += 1;
        Some(item)
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.items.len()
    }
}

fn parse_tag(input: &[u8]) -> IResult<&[u8], u8> {
    nom::number::be_u8().parse(input)
}

fn take_bytes(input: &[u8], n: usize) -> IResult<&[u8], &[u8]> {
    nom::bytes::complete::take(n).parse(input)
}

fn parse_length(input: &[u8]) -> Result<(&[u8], usize)> {
    let (input, n) = parse_tag(input)?;
    if n & 0x80 == 0 {
        // short form: 0-127
        return Ok((input, n as usize));
    }
    // long form: the low 7 bits hold the number of length octets.
    let count = n & 0x7f;
    if count == 0 {
        return Err(Error::IndefiniteLength);
    }
    if count as usize > std::mem::size_of::<usize>() {
        return Err(Error::LengthTooLong(count));
    }
    let (input, bs) = take_bytes(input, count as usize)?;
    let length = bs.iter().fold(0usize, |n, &b| (n << 8) | b as usize);
    Ok((input, length))
}

fn parse_utc_time(text: &str) -> Result<NaiveDateTime> {
    let invalid = || Error::InvalidTime(text.to_string());
    let body = text.strip_suffix('Z').ok_or_else(invalid)?;
    if body.len() != 12 || !body.is_ascii() {
        return Err(invalid());
    }
    let yy: i32 = body[..2].parse().map_err(|_| invalid())?;
    // RFC 5280 4.1.2.5.1
    let year = if yy >= 50 { 1900 + yy } else { 2000 + yy };
    NaiveDateTime::parse_from_str(&format!("{}{}", year, &body[2..]), "%Y%m%d%H%M%S")
        .map_err(|_| invalid())
}

fn parse_generalized_time(text: &str) -> Result<NaiveDateTime> {
    let invalid = || Error::InvalidTime(text.to_string());
    let body = text.strip_suffix('Z').ok_or_else(invalid)?;
    let (base, fraction) = match body.split_once('.') {
        Some((base, fraction)) => (base, Some(fraction)),
        None => (body, None),
    };
    if base.len() != 14 || !base.is_ascii() {
        return Err(invalid());
    }
    let mut dt = NaiveDateTime::parse_from_str(base, "%Y%m%d%H%M%S").map_err(|_| invalid())?;
    if let Some(fraction) = fraction {
        if fraction.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let nanos: i64 = format!("{:0<9}", fraction).parse().map_err(|_| invalid())?;
        dt += TimeDelta::nanoseconds(nanos);
    }
    Ok(dt)
}
