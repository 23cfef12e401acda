//! CBOR decoder.
//!
//! Decodes one RFC 8949 data item into an owned [`Value`] tree. Definite and
//! indefinite lengths are both accepted; nesting depth is capped so hostile
//! input cannot exhaust the stack.

use std::collections::HashSet;

use inkan::decoder::{DecodableFrom, Decoder};
use nom::{IResult, Parser};

pub mod error;

pub use error::{Error, Result};

/// Maximum nesting of arrays, maps and tags.
pub const MAX_DEPTH: usize = 64;

const BREAK: u8 = 0xff;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Major types 0 and 1.
    Integer(i128),
    Bytes(Vec<u8>),
    Text(String),
    Array(Vec<Value>),
    /// Entries in encoded order.
    Map(Vec<(Value, Value)>),
    Tag(u64, Box<Value>),
    Bool(bool),
    Null,
    Undefined,
    Float(f64),
    Simple(u8),
}

/// Identity of a map key for duplicate detection. Integers and strings are
/// compared by value, anything else by its encoding.
#[derive(Debug, PartialEq, Eq, Hash)]
enum MapKey {
    Integer(i128),
    Bytes(Vec<u8>),
    Text(String),
    Encoded(Vec<u8>),
}

impl MapKey {
    fn new(value: &Value, encoded: &[u8]) -> MapKey {
        match value {
            Value::Integer(n) => MapKey::Integer(*n),
            Value::Bytes(b) => MapKey::Bytes(b.clone()),
            Value::Text(t) => MapKey::Text(t.clone()),
            _ => MapKey::Encoded(encoded.to_vec()),
        }
    }
}

impl Value {
    pub fn as_integer(&self) -> Option<i128> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Tag number and content if this is a tagged item.
    pub fn as_tag(&self) -> Option<(u64, &Value)> {
        match self {
            Value::Tag(tag, inner) => Some((*tag, inner)),
            _ => None,
        }
    }

    /// Looks up `key` in a map. Returns `None` for non-maps.
    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn get_int(&self, key: i128) -> Option<&Value> {
        self.get(&Value::Integer(key))
    }

    pub fn get_text(&self, key: &str) -> Option<&Value> {
        self.get(&Value::Text(key.to_string()))
    }
}

impl DecodableFrom<&[u8]> for Value {}

impl Decoder<&[u8], Value> for &[u8] {
    type Error = Error;

    fn decode(&self) -> Result<Value> {
        let (rest, value) = parse_item(self, 0)?;
        if !rest.is_empty() {
            return Err(Error::TrailingData(rest.len()));
        }
        Ok(value)
    }
}

enum Argument {
    Definite(u64),
    Indefinite,
}

fn be_u8(input: &[u8]) -> IResult<&[u8], u8> {
    nom::number::be_u8().parse(input)
}

fn be_u16(input: &[u8]) -> IResult<&[u8], u16> {
    nom::number::be_u16().parse(input)
}

fn be_u32(input: &[u8]) -> IResult<&[u8], u32> {
    nom::number::be_u32().parse(input)
}

fn be_u64(input: &[u8]) -> IResult<&[u8], u64> {
    nom::number::be_u64().parse(input)
}

fn take_bytes(input: &[u8], n: u64) -> IResult<&[u8], &[u8]> {
    nom::bytes::complete::take(n).parse(input)
}

/// Reads the initial byte and its argument.
fn parse_head(input: &[u8]) -> Result<(&[u8], u8, u8, Argument)> {
    let (input, initial) = be_u8(input)?;
    let major = initial >> 5;
    let info = initial & 0x1f;
    let (input, argument) = match info {
        0..=23 => (input, Argument::Definite(info as u64)),
        24 => be_u8(input).map(|(i, n)| (i, Argument::Definite(n as u64)))?,
        25 => be_u16(input).map(|(i, n)| (i, Argument::Definite(n as u64)))?,
        26 => be_u32(input).map(|(i, n)| (i, Argument::Definite(n as u64)))?,
        27 => be_u64(input).map(|(i, n)| (i, Argument::Definite(n)))?,
        31 => (input, Argument::Indefinite),
        _ => return Err(Error::ReservedAdditionalInfo(info)),
    };
    Ok((input, major, info, argument))
}

fn at_break(input: &[u8]) -> bool {
    input.first() == Some(&BREAK)
}

fn parse_item(input: &[u8], depth: usize) -> Result<(&[u8], Value)> {
    if depth > MAX_DEPTH {
        return Err(Error::TooDeep(MAX_DEPTH));
    }
    let (input, major, info, argument) = parse_head(input)?;
    match (major, argument) {
        (0, Argument::Definite(n)) => Ok((input, Value::Integer(n as i128))),
        (1, Argument::Definite(n)) => Ok((input, Value::Integer(-1 - n as i128))),
        (2, argument) => {
            let (input, bytes) = parse_string(input, 2, argument)?;
            Ok((input, Value::Bytes(bytes)))
        }
        (3, argument) => {
            let (input, bytes) = parse_string(input, 3, argument)?;
            let text = String::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)?;
            Ok((input, Value::Text(text)))
        }
        (4, argument) => {
            let mut items = Vec::new();
            let mut input = input;
            match argument {
                Argument::Definite(count) => {
                    for _ in 0..count {
                        let (rest, item) = parse_item(input, depth + 1)?;
                        items.push(item);
                        input = rest;
                    }
                }
                Argument::Indefinite => {
                    while !at_break(input) {
                        let (rest, item) = parse_item(input, depth + 1)?;
                        items.push(item);
                        input = rest;
                    }
                    input = &input[1..];
                }
            }
            Ok((input, Value::Array(items)))
        }
        (5, argument) => {
            let mut entries: Vec<(Value, Value)> = Vec::new();
            let mut seen = HashSet::new();
            let mut input = input;
            let mut remaining = match argument {
                Argument::Definite(count) => Some(count),
                Argument::Indefinite => None,
            };
            loop {
                match remaining.as_mut() {
                    Some(0) => break,
                    Some(n) => *n -= 1,
                    None if at_break(input) => {
                        input = &input[1..];
                        break;
                    }
                    None => {}
                }
                let (after_key, key) = parse_item(input, depth + 1)?;
                let encoded = &input[..input.len() - after_key.len()];
                if !seen.insert(MapKey::new(&key, encoded)) {
                    return Err(Error::DuplicateMapKey);
                }
                let (rest, value) = parse_item(after_key, depth + 1)?;
                entries.push((key, value));
                input = rest;
            }
            Ok((input, Value::Map(entries)))
        }
        (6, Argument::Definite(tag)) => {
            let (input, inner) = parse_item(input, depth + 1)?;
            Ok((input, Value::Tag(tag, Box::new(inner))))
        }
        (7, Argument::Indefinite) => Err(Error::UnexpectedBreak),
        (7, Argument::Definite(n)) => {
            let value = match info {
                20 => Value::Bool(false),
                21 => Value::Bool(true),
                22 => Value::Null,
                23 => Value::Undefined,
                25 => Value::Float(half_to_f64(n as u16)),
                26 => Value::Float(f32::from_bits(n as u32) as f64),
                27 => Value::Float(f64::from_bits(n)),
                _ => Value::Simple(n as u8),
            };
            Ok((input, value))
        }
        // Major types 0, 1 and 6 with additional information 31.
        (_, Argument::Indefinite) => Err(Error::ReservedAdditionalInfo(info)),
        _ => unreachable!("major type is three bits"),
    }
}

/// Byte or text string content; indefinite strings are concatenated chunks
/// of the same major type.
fn parse_string(input: &[u8], major: u8, argument: Argument) -> Result<(&[u8], Vec<u8>)> {
    match argument {
        Argument::Definite(len) => {
            let (input, data) = take_bytes(input, len)?;
            Ok((input, data.to_vec()))
        }
        Argument::Indefinite => {
            let name = if major == 2 { "byte string" } else { "text string" };
            let mut out = Vec::new();
            let mut input = input;
            while !at_break(input) {
                let (rest, chunk_major, _, argument) = parse_head(input)?;
                let len = match (chunk_major == major, argument) {
                    (true, Argument::Definite(len)) => len,
                    _ => return Err(Error::InvalidChunk(name)),
                };
                let (rest, data) = take_bytes(rest, len)?;
                out.extend_from_slice(data);
                input = rest;
            }
            Ok((&input[1..], out))
        }
    }
}

fn half_to_f64(bits: u16) -> f64 {
    let exp = (bits >> 10) & 0x1f;
    let mant = (bits & 0x3ff) as f64;
    let value = match exp {
        0 => mant * 2f64.powi(-24),
        31 if mant == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (mant + 1024.0) * 2f64.powi(exp as i32 - 25),
    };
    if bits & 0x8000 != 0 { -value } else { value }
}

#[cfg(test)]
mod tests {
    use inkan::decoder::Decoder;
    use rstest::rstest;

    use super::*;

    fn decode(input: &[u8]) -> Result<Value> {
        input.decode()
    }

    // Vectors from RFC 8949 Appendix A.
    #[rstest(input, expected,
        case(vec![0x00], Value::Integer(0)),
        case(vec![0x17], Value::Integer(23)),
        case(vec![0x18, 0x18], Value::Integer(24)),
        case(vec![0x19, 0x03, 0xe8], Value::Integer(1000)),
        case(vec![0x1b, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff], Value::Integer(u64::MAX as i128)),
        case(vec![0x20], Value::Integer(-1)),
        case(vec![0x38, 0x24], Value::Integer(-37)),
        case(vec![0x39, 0x03, 0xe7], Value::Integer(-1000)),
        case(vec![0xf4], Value::Bool(false)),
        case(vec![0xf5], Value::Bool(true)),
        case(vec![0xf6], Value::Null),
        case(vec![0xf7], Value::Undefined),
        case(vec![0xf9, 0x3c, 0x00], Value::Float(1.0)),
        case(vec![0xf9, 0xc4, 0x00], Value::Float(-4.0)),
        case(vec![0xfa, 0x47, 0xc3, 0x50, 0x00], Value::Float(100000.0)),
        case(vec![0xfb, 0x3f, 0xf1, 0x99, 0x99, 0x99, 0x99, 0x99, 0x9a], Value::Float(1.1)),
        case(vec![0xf0], Value::Simple(16)),
    )]
    fn test_decode_scalar(input: Vec<u8>, expected: Value) {
        assert_eq!(Ok(expected), decode(&input));
    }

    #[rstest(input, expected,
        case(vec![0x40], Value::Bytes(vec![])),
        case(vec![0x44, 0x01, 0x02, 0x03, 0x04], Value::Bytes(vec![1, 2, 3, 4])),
        case(vec![0x5f, 0x42, 0x01, 0x02, 0x43, 0x03, 0x04, 0x05, 0xff], Value::Bytes(vec![1, 2, 3, 4, 5])),
        case(vec![0x61, 0x61], Value::Text("a".to_string())),
        case(vec![0x64, 0x49, 0x45, 0x54, 0x46], Value::Text("IETF".to_string())),
        case(vec![0x7f, 0x65, 0x73, 0x74, 0x72, 0x65, 0x61, 0x64, 0x6d, 0x69, 0x6e, 0x67, 0xff], Value::Text("streaming".to_string())),
    )]
    fn test_decode_string(input: Vec<u8>, expected: Value) {
        assert_eq!(Ok(expected), decode(&input));
    }

    #[test]
    fn test_decode_nested() {
        // [1, [2, 3], [4, 5]]
        let input = [0x83, 0x01, 0x82, 0x02, 0x03, 0x82, 0x04, 0x05];
        let expected = Value::Array(vec![
            Value::Integer(1),
            Value::Array(vec![Value::Integer(2), Value::Integer(3)]),
            Value::Array(vec![Value::Integer(4), Value::Integer(5)]),
        ]);
        assert_eq!(Ok(expected), decode(&input));

        // {_ "a": 1, "b": [_ 2, 3]}
        let input = [0xbf, 0x61, 0x61, 0x01, 0x61, 0x62, 0x9f, 0x02, 0x03, 0xff, 0xff];
        let value = decode(&input).unwrap();
        assert_eq!(Some(1), value.get_text("a").and_then(Value::as_integer));
        assert_eq!(2, value.get_text("b").and_then(Value::as_array).unwrap().len());
    }

    #[test]
    fn test_decode_tag() {
        // 1(1363896240)
        let input = [0xc1, 0x1a, 0x51, 0x4b, 0x67, 0xb0];
        let value = decode(&input).unwrap();
        assert_eq!(Some((1, &Value::Integer(1363896240))), value.as_tag());
    }

    #[test]
    fn test_map_lookup_by_label() {
        // {1: -37, 3: "cty"}
        let input = [0xa2, 0x01, 0x38, 0x24, 0x03, 0x63, 0x63, 0x74, 0x79];
        let value = decode(&input).unwrap();
        assert_eq!(Some(-37), value.get_int(1).and_then(Value::as_integer));
        assert_eq!(Some("cty"), value.get_int(3).and_then(Value::as_text));
        assert_eq!(None, value.get_int(2));
    }

    #[rstest(input, expected,
        case(vec![0xa2, 0x01, 0x01, 0x01, 0x02], Error::DuplicateMapKey),
        case(vec![0x00, 0x00], Error::TrailingData(1)),
        case(vec![0xff], Error::UnexpectedBreak),
        case(vec![0x1c], Error::ReservedAdditionalInfo(28)),
        case(vec![0x1f], Error::ReservedAdditionalInfo(31)),
        case(vec![0x62, 0xc3, 0x28], Error::InvalidUtf8),
        case(vec![0x5f, 0x61, 0x61, 0xff], Error::InvalidChunk("byte string")),
    )]
    fn test_decode_invalid(input: Vec<u8>, expected: Error) {
        assert_eq!(Err(expected), decode(&input));
    }

    /// Definite map of `count` entries `i: 0`, then `extra` appended as is.
    fn uint_map(count: u32, extra: &[u8]) -> Vec<u8> {
        let mut out = vec![0xba];
        out.extend_from_slice(&count.to_be_bytes());
        for i in 0..count - (extra.len() as u32 / 6) {
            out.push(0x1a);
            out.extend_from_slice(&i.to_be_bytes());
            out.push(0x00);
        }
        out.extend_from_slice(extra);
        out
    }

    #[rstest(extra, expected,
        case(vec![], Ok(60_000)),
        // key 7 again, at the end of the map
        case(vec![0x1a, 0x00, 0x00, 0x00, 0x07, 0x00], Err(Error::DuplicateMapKey)),
    )]
    fn test_decode_large_map(extra: Vec<u8>, expected: Result<usize>) {
        let input = uint_map(60_000, &extra);
        let result = decode(&input).map(|value| value.as_map().unwrap().len());
        assert_eq!(expected, result);
    }

    #[rstest(input,
        // {[1]: 0, [1]: 1}
        case(vec![0xa2, 0x81, 0x01, 0x00, 0x81, 0x01, 0x01]),
        // {"a": 0, "a": 1}
        case(vec![0xa2, 0x61, 0x61, 0x00, 0x61, 0x61, 0x01]),
        // {h'01': 0, h'01': 1}
        case(vec![0xa2, 0x41, 0x01, 0x00, 0x41, 0x01, 0x01]),
        // {1: 0, 1: 1} with a non-minimal second key
        case(vec![0xa2, 0x01, 0x00, 0x18, 0x01, 0x01]),
    )]
    fn test_decode_duplicate_keys(input: Vec<u8>) {
        assert_eq!(Err(Error::DuplicateMapKey), decode(&input));
    }

    #[test]
    fn test_decode_truncated() {
        assert!(decode(&[0x44, 0x01, 0x02]).is_err());
        assert!(decode(&[0x82, 0x01]).is_err());
    }

    #[test]
    fn test_decode_too_deep() {
        let input = vec![0x81; MAX_DEPTH + 2];
        assert_eq!(Err(Error::TooDeep(MAX_DEPTH)), decode(&input));
    }
}
