//! Frame builders and the TLV cursor.
//!
//! A frame is a fixed little-endian header followed by zero or more TLVs.
//! Builders reserve the header up front and patch the total length in
//! `finish`, so a finished frame is always self-consistent. A failed append
//! leaves the buffer untouched; callers observe either a fully-built frame
//! or a clean error.

use byteorder::{ByteOrder, LittleEndian};

use crate::args::WireType;
use crate::error::ProtoError;
use crate::status::Status;
use crate::{MAX_FRAME_BYTES, REQUEST_HEADER_BYTES, RESPONSE_HEADER_BYTES, TLV_HEADER_BYTES};

/// One decoded TLV, borrowing its value from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub wire_type: u8,
    pub value: &'a [u8],
}

/// Sequential decoder over a borrowed TLV payload.
///
/// `next` yields `Ok(Some(tlv))` while TLVs remain, `Ok(None)` once the
/// payload is cleanly exhausted, and an error when a declared length
/// overruns the payload (a corrupt frame).
#[derive(Debug, Clone, Copy)]
pub struct TlvCursor<'a> {
    rest: &'a [u8],
}

impl<'a> TlvCursor<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        Self { rest: payload }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<Option<Tlv<'a>>, ProtoError> {
        if self.rest.is_empty() {
            return Ok(None);
        }
        if self.rest.len() < TLV_HEADER_BYTES {
            return Err(ProtoError::TruncatedTlv {
                remaining: self.rest.len(),
            });
        }
        let wire_type = self.rest[0];
        let declared = LittleEndian::read_u16(&self.rest[1..3]) as usize;
        let body = &self.rest[TLV_HEADER_BYTES..];
        if declared > body.len() {
            return Err(ProtoError::TlvOverrun {
                declared,
                remaining: body.len(),
            });
        }
        let (value, rest) = body.split_at(declared);
        self.rest = rest;
        Ok(Some(Tlv { wire_type, value }))
    }
}

fn push_tlv(
    buf: &mut Vec<u8>,
    capacity: usize,
    wire_type: WireType,
    value: &[u8],
) -> Result<(), ProtoError> {
    if value.len() > u16::MAX as usize {
        return Err(ProtoError::ValueTooLong(value.len()));
    }
    let needed = buf.len() + TLV_HEADER_BYTES + value.len();
    if needed > capacity {
        return Err(ProtoError::FrameOverflow { needed, capacity });
    }
    buf.push(wire_type.as_wire());
    let mut len = [0u8; 2];
    LittleEndian::write_u16(&mut len, value.len() as u16);
    buf.extend_from_slice(&len);
    buf.extend_from_slice(value);
    Ok(())
}

fn patch_len(buf: &mut [u8]) {
    let total = buf.len() as u16;
    LittleEndian::write_u16(&mut buf[0..2], total);
}

/// Builds a request frame: `{len, opcode, pid}` header plus TLVs.
#[derive(Debug)]
pub struct RequestBuilder {
    buf: Vec<u8>,
    capacity: usize,
}

impl RequestBuilder {
    pub fn new(opcode: u8, pid: i32) -> Self {
        Self::with_capacity(opcode, pid, MAX_FRAME_BYTES)
    }

    pub fn with_capacity(opcode: u8, pid: i32, capacity: usize) -> Self {
        let capacity = capacity.min(MAX_FRAME_BYTES);
        let mut buf = Vec::with_capacity(REQUEST_HEADER_BYTES + 64);
        buf.extend_from_slice(&[0, 0]);
        buf.push(opcode);
        buf.extend_from_slice(&pid.to_le_bytes());
        Self { buf, capacity }
    }

    pub fn push(&mut self, wire_type: WireType, value: &[u8]) -> Result<(), ProtoError> {
        push_tlv(&mut self.buf, self.capacity, wire_type, value)
    }

    pub fn finish(mut self) -> Vec<u8> {
        patch_len(&mut self.buf);
        self.buf
    }
}

/// Builds a response frame: `{len, opcode, status}` header plus TLVs.
#[derive(Debug)]
pub struct ResponseBuilder {
    buf: Vec<u8>,
    capacity: usize,
}

impl ResponseBuilder {
    pub fn new(opcode: u8, status: Status) -> Self {
        Self::with_capacity(opcode, status, MAX_FRAME_BYTES)
    }

    pub fn with_capacity(opcode: u8, status: Status, capacity: usize) -> Self {
        let capacity = capacity.min(MAX_FRAME_BYTES);
        let mut buf = Vec::with_capacity(RESPONSE_HEADER_BYTES + 64);
        buf.extend_from_slice(&[0, 0]);
        buf.push(opcode);
        buf.push(status.as_wire());
        Self { buf, capacity }
    }

    pub fn push(&mut self, wire_type: WireType, value: &[u8]) -> Result<(), ProtoError> {
        push_tlv(&mut self.buf, self.capacity, wire_type, value)
    }

    pub fn finish(mut self) -> Vec<u8> {
        patch_len(&mut self.buf);
        self.buf
    }
}

/// A parsed request frame, borrowing the payload.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub opcode: u8,
    pub pid: i32,
    pub payload: &'a [u8],
}

impl<'a> Request<'a> {
    pub fn parse(frame: &'a [u8]) -> Result<Self, ProtoError> {
        if frame.len() < REQUEST_HEADER_BYTES {
            return Err(ProtoError::TruncatedHeader {
                expected: REQUEST_HEADER_BYTES,
                actual: frame.len(),
            });
        }
        let declared = LittleEndian::read_u16(&frame[0..2]) as usize;
        if declared != frame.len() {
            return Err(ProtoError::LengthMismatch {
                declared,
                actual: frame.len(),
            });
        }
        Ok(Self {
            opcode: frame[2],
            pid: LittleEndian::read_i32(&frame[3..7]),
            payload: &frame[REQUEST_HEADER_BYTES..],
        })
    }
}

/// A parsed response frame, borrowing the payload.
#[derive(Debug, Clone, Copy)]
pub struct Response<'a> {
    pub opcode: u8,
    pub status: Status,
    pub payload: &'a [u8],
}

impl<'a> Response<'a> {
    pub fn parse(frame: &'a [u8]) -> Result<Self, ProtoError> {
        if frame.len() < RESPONSE_HEADER_BYTES {
            return Err(ProtoError::TruncatedHeader {
                expected: RESPONSE_HEADER_BYTES,
                actual: frame.len(),
            });
        }
        let declared = LittleEndian::read_u16(&frame[0..2]) as usize;
        if declared != frame.len() {
            return Err(ProtoError::LengthMismatch {
                declared,
                actual: frame.len(),
            });
        }
        let status = Status::from_wire(frame[3]).ok_or(ProtoError::UnknownStatus(frame[3]))?;
        Ok(Self {
            opcode: frame[2],
            status,
            payload: &frame[RESPONSE_HEADER_BYTES..],
        })
    }
}

/// Build a response carrying a single `Str` TLV.
pub fn simple_response(opcode: u8, status: Status, text: &str) -> Result<Vec<u8>, ProtoError> {
    let mut rsp = ResponseBuilder::new(opcode, status);
    rsp.push(WireType::Str, text.as_bytes())?;
    Ok(rsp.finish())
}

/// The fallback frame a worker emits when anything else fails. Built by
/// hand so this path itself cannot fail.
pub fn error_response(opcode: u8) -> Vec<u8> {
    let text = b"ERR";
    let mut buf = Vec::with_capacity(RESPONSE_HEADER_BYTES + TLV_HEADER_BYTES + text.len());
    buf.extend_from_slice(&[0, 0]);
    buf.push(opcode);
    buf.push(Status::Error.as_wire());
    buf.push(WireType::Str.as_wire());
    buf.extend_from_slice(&(text.len() as u16).to_le_bytes());
    buf.extend_from_slice(text);
    patch_len(&mut buf);
    buf
}

/// Extract the first argument of a payload as a `Str`.
///
/// Requires the payload to open with a non-empty string TLV of at most
/// `max_len` bytes.
pub fn first_str(payload: &[u8], max_len: usize) -> Result<&[u8], ProtoError> {
    let mut cursor = TlvCursor::new(payload);
    let tlv = cursor.next()?.ok_or(ProtoError::MissingArgument)?;
    if tlv.wire_type != WireType::Str.as_wire() {
        return Err(ProtoError::ExpectedStr);
    }
    if tlv.value.is_empty() {
        return Err(ProtoError::EmptyStr);
    }
    if tlv.value.len() > max_len {
        return Err(ProtoError::StrTooLong {
            len: tlv.value.len(),
            max: max_len,
        });
    }
    Ok(tlv.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_frame_length_is_self_consistent() {
        let mut req = RequestBuilder::new(b's', 42);
        req.push(WireType::Str, b"needle").unwrap();
        req.push(WireType::U32, &7u32.to_le_bytes()).unwrap();
        let frame = req.finish();

        let declared = u16::from_le_bytes([frame[0], frame[1]]) as usize;
        assert_eq!(declared, frame.len());
        assert_eq!(
            declared,
            REQUEST_HEADER_BYTES + (TLV_HEADER_BYTES + 6) + (TLV_HEADER_BYTES + 4)
        );
    }

    #[test]
    fn overflowing_append_leaves_builder_untouched() {
        let mut rsp = ResponseBuilder::with_capacity(b'c', Status::Ok, 16);
        rsp.push(WireType::Str, b"fits").unwrap();
        let before = rsp.buf.clone();

        let err = rsp.push(WireType::Str, b"does not fit at all").unwrap_err();
        assert!(matches!(err, ProtoError::FrameOverflow { .. }));
        assert_eq!(rsp.buf, before);
    }

    #[test]
    fn cursor_walks_tlvs_then_reports_exhaustion() {
        let mut rsp = ResponseBuilder::new(b'c', Status::Ok);
        rsp.push(WireType::Str, b"alpha").unwrap();
        rsp.push(WireType::U32, &9u32.to_le_bytes()).unwrap();
        let frame = rsp.finish();
        let parsed = Response::parse(&frame).unwrap();

        let mut cursor = TlvCursor::new(parsed.payload);
        let first = cursor.next().unwrap().unwrap();
        assert_eq!(first.wire_type, WireType::Str.as_wire());
        assert_eq!(first.value, b"alpha");
        let second = cursor.next().unwrap().unwrap();
        assert_eq!(second.value, &9u32.to_le_bytes());
        assert!(cursor.next().unwrap().is_none());
    }

    #[test]
    fn cursor_rejects_overrunning_tlv_length() {
        // Type byte + declared length 200, but only 3 value bytes follow.
        let payload = [2u8, 200, 0, b'a', b'b', b'c'];
        let mut cursor = TlvCursor::new(&payload);
        assert!(matches!(
            cursor.next(),
            Err(ProtoError::TlvOverrun {
                declared: 200,
                remaining: 3
            })
        ));
    }

    #[test]
    fn parse_rejects_length_mismatch() {
        let mut frame = simple_response(b'c', Status::Ok, "x").unwrap();
        frame.push(0);
        assert!(matches!(
            Response::parse(&frame),
            Err(ProtoError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn error_response_parses_as_err() {
        let frame = error_response(b'l');
        let parsed = Response::parse(&frame).unwrap();
        assert_eq!(parsed.status, Status::Error);
        assert_eq!(first_str(parsed.payload, 16).unwrap(), b"ERR");
    }

    #[test]
    fn first_str_contract() {
        let mut rsp = ResponseBuilder::new(b's', Status::Ok);
        rsp.push(WireType::U32, &1u32.to_le_bytes()).unwrap();
        let frame = rsp.finish();
        let parsed = Response::parse(&frame).unwrap();
        assert!(matches!(
            first_str(parsed.payload, 255),
            Err(ProtoError::ExpectedStr)
        ));

        assert!(matches!(
            first_str(&[], 255),
            Err(ProtoError::MissingArgument)
        ));

        let frame = simple_response(b's', Status::Ok, "kw").unwrap();
        let parsed = Response::parse(&frame).unwrap();
        assert!(matches!(
            first_str(parsed.payload, 1),
            Err(ProtoError::StrTooLong { len: 2, max: 1 })
        ));
    }
}
