use thiserror::Error;

/// Errors produced while decoding transport stream structures.
#[derive(Error, Debug)]
pub enum TsError {
    #[error("Insufficient data: expected {expected} bytes, got {actual}")]
    InsufficientData { expected: usize, actual: usize },

    #[error("Invalid sync byte: 0x{0:02x}")]
    InvalidSyncByte(u8),

    #[error("Invalid table id: expected 0x{expected:02x}, got 0x{actual:02x}")]
    InvalidTableId { expected: u8, actual: u8 },

    #[error("Invalid section length {length} for table 0x{table_id:02x}")]
    InvalidSectionLength { table_id: u8, length: usize },

    #[error("CRC mismatch for table 0x{table_id:02x}: expected 0x{expected:08x}, computed 0x{computed:08x}")]
    CrcMismatch {
        table_id: u8,
        expected: u32,
        computed: u32,
    },

    #[error("Invalid PES start code")]
    InvalidPesStartCode,

    #[error("Invalid SCTE-35 section: {0}")]
    InvalidScte35(String),

    #[error("Invalid time reference: {0}")]
    InvalidTimeReference(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TsError {
    pub(crate) fn short(expected: usize, actual: usize) -> Self {
        TsError::InsufficientData { expected, actual }
    }

    pub(crate) fn scte35(reason: impl Into<String>) -> Self {
        TsError::InvalidScte35(reason.into())
    }
}
