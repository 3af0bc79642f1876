//! # Canonical Encoding
//!
//! Deterministic binary encoding of the values committee members sign.
//!
//! The encoding is the compact "binary canonical" layout used by the PoS chain:
//! - fixed-width integers are little-endian at their natural width
//! - `bool` is a single `0`/`1` byte
//! - byte and string sequences carry a ULEB128 length prefix
//! - fixed-size arrays carry no prefix at all
//! - `Option` is a one-byte presence flag followed by the value
//! - maps are a ULEB128 count followed by entries sorted by their encoded key bytes
//! - records are their fields in declaration order ([`canonical_record!`])
//!
//! ## Determinism
//!
//! Two logically equal values always encode to the same bytes. Map iteration
//! order never leaks into the output, so a `HashMap` and a `BTreeMap` holding
//! the same entries encode identically.

mod map;

use thiserror::Error;

/// Longest sequence the encoding accepts (2^31 - 1 elements).
pub const MAX_SEQUENCE_LENGTH: usize = (1 << 31) - 1;

/// Errors that can occur while producing a canonical encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("Sequence of {len} elements exceeds the maximum encodable length {max}")]
    SequenceTooLong { len: usize, max: usize },
}

/// A value with a canonical binary encoding.
pub trait CanonicalEncode {
    /// Append the canonical encoding of `self` to `out`.
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError>;

    /// Canonical encoding of `self` as a fresh buffer.
    fn to_canonical_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::new();
        self.encode_to(&mut out)?;
        Ok(out)
    }
}

/// Canonical encoding of `value`.
pub fn to_canonical_bytes<T: CanonicalEncode + ?Sized>(value: &T) -> Result<Vec<u8>, EncodeError> {
    value.to_canonical_bytes()
}

/// Append `value` as ULEB128 (7 bits per byte, high bit = continuation).
pub fn write_uleb128(out: &mut Vec<u8>, mut value: u32) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Append a sequence length prefix, rejecting lengths the encoding cannot express.
pub fn write_length(out: &mut Vec<u8>, len: usize) -> Result<(), EncodeError> {
    if len > MAX_SEQUENCE_LENGTH {
        return Err(EncodeError::SequenceTooLong {
            len,
            max: MAX_SEQUENCE_LENGTH,
        });
    }
    write_uleb128(out, len as u32);
    Ok(())
}

/// Implements [`CanonicalEncode`] for a record by encoding the listed fields
/// in order. Fields named in the trailing `skip` list are not part of the
/// encoding (signatures carried next to the signed payload, for example).
///
/// ```ignore
/// canonical_record!(LedgerInfo { commit_info, consensus_data_hash });
/// canonical_record!(LedgerInfoWithSignatures { ledger_info } skip { signatures });
/// ```
#[macro_export]
macro_rules! canonical_record {
    ($ty:ident { $($field:ident),* $(,)? } $(skip { $($skipped:ident),* $(,)? })?) => {
        impl $crate::codec::CanonicalEncode for $ty {
            fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), $crate::codec::EncodeError> {
                $( $crate::codec::CanonicalEncode::encode_to(&self.$field, out)?; )*
                $( $( let _ = &self.$skipped; )* )?
                Ok(())
            }
        }
    };
}

macro_rules! impl_int {
    ($($int:ty),*) => {
        $(
            impl CanonicalEncode for $int {
                fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
                    out.extend_from_slice(&self.to_le_bytes());
                    Ok(())
                }
            }
        )*
    };
}

impl_int!(u8, u16, u32, u64, u128, i8, i16, i32, i64, i128);

impl CanonicalEncode for bool {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        out.push(u8::from(*self));
        Ok(())
    }
}

impl CanonicalEncode for str {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_length(out, self.len())?;
        out.extend_from_slice(self.as_bytes());
        Ok(())
    }
}

impl CanonicalEncode for String {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.as_str().encode_to(out)
    }
}

impl<T: CanonicalEncode> CanonicalEncode for [T] {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        write_length(out, self.len())?;
        for item in self {
            item.encode_to(out)?;
        }
        Ok(())
    }
}

impl<T: CanonicalEncode> CanonicalEncode for Vec<T> {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        self.as_slice().encode_to(out)
    }
}

// Arity is known from the schema, so no length prefix.
impl<T: CanonicalEncode, const N: usize> CanonicalEncode for [T; N] {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        for item in self {
            item.encode_to(out)?;
        }
        Ok(())
    }
}

impl<T: CanonicalEncode> CanonicalEncode for Option<T> {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Some(value) => {
                out.push(1);
                value.encode_to(out)
            }
            None => {
                out.push(0);
                Ok(())
            }
        }
    }
}

impl<T: CanonicalEncode + ?Sized> CanonicalEncode for &T {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        (**self).encode_to(out)
    }
}

impl<T: CanonicalEncode + ?Sized> CanonicalEncode for Box<T> {
    fn encode_to(&self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        (**self).encode_to(out)
    }
}
