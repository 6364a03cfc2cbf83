use super::identifier::{Identifier, ID_MASK};
use super::payload::{payload_from_slice, Payload, MAX_PAYLOAD_LEN};
use crate::error::{FrameError, PayloadError};

/// Size of one frame on the datagram transport: identifier word, data
/// length code, eight data bytes.
pub const DATAGRAM_LEN: usize = 4 + 1 + MAX_PAYLOAD_LEN;

// Bit 31 of the identifier word marks extended-format addressing, as in
// SocketCAN's `CAN_EFF_FLAG`.
const EXTENDED_FLAG: u32 = 0x8000_0000;

/// One bus frame: a 29-bit identifier and 0-8 data bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: Identifier,
    data: Payload,
}

impl Frame {
    pub fn new(id: Identifier, data: &[u8]) -> Result<Self, PayloadError> {
        Ok(Self {
            id,
            data: payload_from_slice(data)?,
        })
    }

    pub fn with_payload(id: Identifier, data: Payload) -> Self {
        Self { id, data }
    }

    pub fn id(&self) -> &Identifier {
        &self.id
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn payload(&self) -> &Payload {
        &self.data
    }

    pub fn encode(&self) -> [u8; DATAGRAM_LEN] {
        let mut buf = [0u8; DATAGRAM_LEN];
        buf[..4].copy_from_slice(&(self.id.to_raw() | EXTENDED_FLAG).to_be_bytes());
        buf[4] = self.data.len() as u8;
        buf[5..5 + self.data.len()].copy_from_slice(&self.data);
        buf
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != DATAGRAM_LEN {
            return Err(FrameError::InvalidLength(bytes.len()));
        }

        let word = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if word & EXTENDED_FLAG == 0 {
            return Err(FrameError::NotExtended);
        }
        let id = Identifier::try_from_raw(word & !EXTENDED_FLAG)?;

        let dlc = bytes[4];
        if dlc as usize > MAX_PAYLOAD_LEN {
            return Err(FrameError::InvalidDlc(dlc));
        }
        let data = &bytes[5..5 + dlc as usize];

        Ok(Self {
            id,
            data: data.iter().copied().collect(),
        })
    }
}

impl core::fmt::Display for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{:08X} [{}]", self.id.to_raw() & ID_MASK, self.data.len())?;
        for byte in &self.data {
            write!(f, " {:02X}", byte)?;
        }
        Ok(())
    }
}
