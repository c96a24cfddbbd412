//! Typed argument encoding.
//!
//! Arguments travel as TLVs; the two wire types form a small closed set, so
//! both directions are a single match. The encoder turns a textual client
//! token into value bytes; the decoder turns a TLV back into a typed value
//! borrowing from the frame.

use byteorder::{ByteOrder, LittleEndian};
use std::borrow::Cow;

use crate::error::ProtoError;
use crate::frame::Tlv;

/// Wire type tag carried in every TLV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WireType {
    U32 = 1,
    Str = 2,
}

impl WireType {
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(WireType::U32),
            2 => Some(WireType::Str),
            _ => None,
        }
    }

    #[inline]
    pub fn as_wire(self) -> u8 {
        self as u8
    }
}

/// A decoded argument value. Strings borrow from the frame and carry no
/// NUL-termination assumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue<'a> {
    U32(u32),
    Str(&'a [u8]),
}

/// Encode a textual token into TLV value bytes for `wire_type`.
///
/// `U32` parses a decimal string (empty, non-numeric, and out-of-range
/// tokens are rejected); `Str` forwards the bytes unchanged.
pub fn encode_arg<'a>(wire_type: WireType, token: &'a str) -> Result<Cow<'a, [u8]>, ProtoError> {
    match wire_type {
        WireType::U32 => {
            let value: u32 = token.parse().map_err(|_| ProtoError::BadU32Token {
                token: token.to_string(),
            })?;
            Ok(Cow::Owned(value.to_le_bytes().to_vec()))
        }
        WireType::Str => {
            if token.len() > u16::MAX as usize {
                return Err(ProtoError::ValueTooLong(token.len()));
            }
            Ok(Cow::Borrowed(token.as_bytes()))
        }
    }
}

/// Decode one TLV into a typed value.
pub fn decode_arg<'a>(tlv: &Tlv<'a>) -> Result<ArgValue<'a>, ProtoError> {
    match WireType::from_wire(tlv.wire_type) {
        Some(WireType::U32) => {
            if tlv.value.len() != 4 {
                return Err(ProtoError::BadU32Length(tlv.value.len()));
            }
            Ok(ArgValue::U32(LittleEndian::read_u32(tlv.value)))
        }
        Some(WireType::Str) => Ok(ArgValue::Str(tlv.value)),
        None => Err(ProtoError::UnknownWireType(tlv.wire_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u32_tokens_roundtrip() {
        let bytes = encode_arg(WireType::U32, "2020").unwrap();
        assert_eq!(bytes.as_ref(), &2020u32.to_le_bytes());

        let tlv = Tlv {
            wire_type: WireType::U32.as_wire(),
            value: &bytes,
        };
        assert_eq!(decode_arg(&tlv).unwrap(), ArgValue::U32(2020));
    }

    #[test]
    fn bad_u32_tokens_are_rejected() {
        for token in ["", "abc", "12x", "-1", "4294967296"] {
            assert!(
                matches!(
                    encode_arg(WireType::U32, token),
                    Err(ProtoError::BadU32Token { .. })
                ),
                "token {token:?} should not parse"
            );
        }
    }

    #[test]
    fn str_tokens_pass_through() {
        let bytes = encode_arg(WireType::Str, "p.txt").unwrap();
        assert_eq!(bytes.as_ref(), b"p.txt");
    }

    #[test]
    fn u32_decode_requires_exactly_four_bytes() {
        let tlv = Tlv {
            wire_type: WireType::U32.as_wire(),
            value: &[1, 2, 3],
        };
        assert!(matches!(decode_arg(&tlv), Err(ProtoError::BadU32Length(3))));
    }

    #[test]
    fn unknown_wire_type_is_rejected() {
        let tlv = Tlv {
            wire_type: 9,
            value: b"",
        };
        assert!(matches!(
            decode_arg(&tlv),
            Err(ProtoError::UnknownWireType(9))
        ));
    }
}
