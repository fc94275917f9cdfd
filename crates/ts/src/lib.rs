//! MPEG-2 Transport Stream decoding for splice analysis.
//!
//! Provides a resynchronising packet reader, PSI section reassembly, and
//! decoders for the PAT, PMT, PES timestamps, SCTE-35 splice information
//! and DVB time tables.

pub mod adaptation_field;
pub mod crc32;
pub mod descriptor;
pub mod error;
pub mod packet;
pub mod pat;
pub mod pes;
pub mod pmt;
pub mod reader;
pub mod scte35;
pub mod section;
pub mod tdt;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;

pub use adaptation_field::AdaptationField;
pub use crc32::{crc32_mpeg2, stored_crc};
pub use descriptor::{Descriptor, Descriptors, TAG_CUE_IDENTIFIER};
pub use error::TsError;
pub use packet::{PID_NULL, PID_PAT, PID_TDT, Scrambling, TS_PACKET_SIZE, TsPacket};
pub use pat::{Pat, PatProgram};
pub use pes::{PesTimestamp, extract_timestamp};
pub use pmt::{ElementaryStream, Pmt, ScteBinding, StreamType, bind_scte35};
pub use reader::{PacketReader, SyncRecovery};
pub use scte35::{
    BreakDuration, SpliceCommand, SpliceCommandType, SpliceComponent, SpliceDescriptor,
    SpliceInfoSection, SpliceInsert, TimeSignal,
};
pub use section::{Section, SectionAssembler, SeenSections};
pub use tdt::StreamTime;

/// Result type for TS parsing operations
pub type Result<T> = std::result::Result<T, TsError>;
