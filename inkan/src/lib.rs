//! # inkan
//!
//! Core traits shared by the inkan signature inspection crates.
//!
//! Every layer of an envelope is reached by a typed conversion from the
//! layer below it:
//!
//! ```text
//! bytes → cbor::Value → COSE_Sign1 → EnvelopeContent
//! bytes → der::Tlv   → Certificate
//! bytes → der::Tlv   → TimestampToken
//! ```
//!
//! Each arrow is a `Decoder` implementation, so callers ask for the type they
//! want and the compiler picks the conversion:
//!
//! ```ignore
//! use inkan::decoder::Decoder;
//! use inkan_x509::Certificate;
//!
//! let der: &[u8] = &cert_bytes;
//! let cert: Certificate = der.decode()?;
//! ```

#![forbid(unsafe_code)]

pub mod decoder;
