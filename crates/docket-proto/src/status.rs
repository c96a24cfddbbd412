/// Result kind shared by the codec, dispatcher, and response frames.
///
/// `Again` historically meant "one more TLV was delivered" in the cursor
/// API; on the wire it only ever appears in response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Again = 1,
    Error = 2,
    Shutdown = 3,
}

impl Status {
    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Status::Ok),
            1 => Some(Status::Again),
            2 => Some(Status::Error),
            3 => Some(Status::Shutdown),
            _ => None,
        }
    }

    #[inline]
    pub fn as_wire(self) -> u8 {
        self as u8
    }
}
