use crate::adaptation_field::AdaptationField;
use crate::{Result, TsError};

/// Size of one transport stream packet
pub const TS_PACKET_SIZE: usize = 188;

/// Standard sync byte
pub const SYNC_BYTE: u8 = 0x47;

/// Alternate sync byte accepted in tolerant mode (bit-inverted captures)
pub const ALT_SYNC_BYTE: u8 = 0xB8;

/// PAT PID (always 0x0000)
pub const PID_PAT: u16 = 0x0000;

/// TDT/TOT PID (always 0x0014)
pub const PID_TDT: u16 = 0x0014;

/// NULL PID (always 0x1FFF)
pub const PID_NULL: u16 = 0x1FFF;

/// Size of the fixed packet header
const HEADER_SIZE: usize = 4;

/// Returns true for both accepted sync byte values.
#[inline]
pub fn is_sync_byte(byte: u8) -> bool {
    byte == SYNC_BYTE || byte == ALT_SYNC_BYTE
}

/// Transport scrambling control field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scrambling {
    NotScrambled,
    Reserved,
    EvenKey,
    OddKey,
}

impl From<u8> for Scrambling {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0b00 => Scrambling::NotScrambled,
            0b01 => Scrambling::Reserved,
            0b10 => Scrambling::EvenKey,
            _ => Scrambling::OddKey,
        }
    }
}

impl Scrambling {
    pub fn is_scrambled(self) -> bool {
        matches!(self, Scrambling::EvenKey | Scrambling::OddKey)
    }
}

/// One 188-byte transport stream packet.
///
/// The packet keeps its raw bytes and decodes header fields on demand.
#[derive(Clone, PartialEq, Eq)]
pub struct TsPacket {
    data: [u8; TS_PACKET_SIZE],
}

impl std::fmt::Debug for TsPacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TsPacket")
            .field("pid", &format_args!("0x{:04x}", self.pid()))
            .field("pusi", &self.payload_unit_start_indicator())
            .field("afc", &self.adaptation_field_control())
            .field("cc", &self.continuity_counter())
            .finish()
    }
}

impl TsPacket {
    /// Wrap an already framed packet. The sync byte is not checked.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn new(data: [u8; TS_PACKET_SIZE]) -> Self {
        Self { data }
    }

    /// Accept a framed packet that starts with either sync byte.
    pub fn parse(data: [u8; TS_PACKET_SIZE]) -> Result<Self> {
        if !is_sync_byte(data[0]) {
            return Err(TsError::InvalidSyncByte(data[0]));
        }
        Ok(Self { data })
    }

    /// Raw packet bytes
    pub fn as_bytes(&self) -> &[u8; TS_PACKET_SIZE] {
        &self.data
    }

    pub fn sync_byte(&self) -> u8 {
        self.data[0]
    }

    pub fn transport_error_indicator(&self) -> bool {
        (self.data[1] & 0x80) != 0
    }

    pub fn payload_unit_start_indicator(&self) -> bool {
        (self.data[1] & 0x40) != 0
    }

    /// Packet Identifier (13 bits)
    pub fn pid(&self) -> u16 {
        ((self.data[1] as u16 & 0x1F) << 8) | self.data[2] as u16
    }

    pub fn scrambling(&self) -> Scrambling {
        Scrambling::from(self.data[3] >> 6)
    }

    /// Adaptation field control (2 bits)
    pub fn adaptation_field_control(&self) -> u8 {
        (self.data[3] >> 4) & 0x03
    }

    pub fn continuity_counter(&self) -> u8 {
        self.data[3] & 0x0F
    }

    /// Check if this packet has an adaptation field
    pub fn has_adaptation_field(&self) -> bool {
        matches!(self.adaptation_field_control(), 0x02 | 0x03)
    }

    /// Check if this packet has a payload
    pub fn has_payload(&self) -> bool {
        matches!(self.adaptation_field_control(), 0x01 | 0x03)
    }

    /// Adaptation field length byte, if an adaptation field is present.
    pub fn adaptation_field_length(&self) -> Option<u8> {
        self.has_adaptation_field().then(|| self.data[HEADER_SIZE])
    }

    /// Adaptation field body (excluding the length byte).
    pub fn adaptation_field(&self) -> Option<&[u8]> {
        let len = self.adaptation_field_length()? as usize;
        let start = HEADER_SIZE + 1;
        let end = (start + len).min(TS_PACKET_SIZE);
        Some(&self.data[start..end])
    }

    /// Parse the adaptation field flags.
    pub fn parse_adaptation_field(&self) -> Option<AdaptationField> {
        self.adaptation_field().and_then(AdaptationField::parse)
    }

    /// Offset of the first payload byte: 4, or 4 + 1 + adaptation_field_length.
    ///
    /// Returns `None` when there is no payload or the adaptation field
    /// swallows the whole packet.
    pub fn payload_offset(&self) -> Option<usize> {
        if !self.has_payload() {
            return None;
        }
        let offset = match self.adaptation_field_length() {
            Some(len) => HEADER_SIZE + 1 + len as usize,
            None => HEADER_SIZE,
        };
        (offset < TS_PACKET_SIZE).then_some(offset)
    }

    /// Payload bytes following the header and adaptation field.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload_offset().map(|offset| &self.data[offset..])
    }

    /// Random access indicator. An absent or empty adaptation field reads as false.
    pub fn random_access_indicator(&self) -> bool {
        self.parse_adaptation_field()
            .is_some_and(|af| af.random_access_indicator)
    }

    /// True when this packet begins a PES packet (PUSI set and the payload
    /// starts with `00 00 01`).
    pub fn starts_pes(&self) -> bool {
        self.payload_unit_start_indicator()
            && self
                .payload()
                .is_some_and(|p| p.len() >= 3 && p[..3] == [0x00, 0x00, 0x01])
    }
}
