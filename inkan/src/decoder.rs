//! Decoder trait for type-safe conversions.
//!
//! `Decoder<T, D>` is implemented on a source type `T` and produces a
//! destination `D`. The destination must opt in through the
//! `DecodableFrom<T>` marker, which keeps unrelated pairs from type-checking.
//!
//! ```no_run
//! use inkan::decoder::{DecodableFrom, Decoder};
//!
//! struct Armored(String);
//! struct Raw(Vec<u8>);
//!
//! #[derive(Debug)]
//! struct NotAscii;
//!
//! impl DecodableFrom<Armored> for Raw {}
//!
//! impl Decoder<Armored, Raw> for Armored {
//!     type Error = NotAscii;
//!
//!     fn decode(&self) -> Result<Raw, Self::Error> {
//!         if !self.0.is_ascii() {
//!             return Err(NotAscii);
//!         }
//!         Ok(Raw(self.0.as_bytes().to_vec()))
//!     }
//! }
//! ```

/// Converts `self` (of type `T`) into `D`.
pub trait Decoder<T, D: DecodableFrom<T>> {
    /// The error type returned when decoding fails.
    type Error;

    /// Decodes `self` into type `D`.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid encoding of `D`.
    fn decode(&self) -> Result<D, Self::Error>;
}

/// Marker trait indicating that type `D` can be decoded from type `T`.
pub trait DecodableFrom<T> {}
