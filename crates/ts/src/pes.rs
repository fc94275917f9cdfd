use crate::packet::{TS_PACKET_SIZE, TsPacket};

/// Offsets from the start of the PES packet
const STREAM_ID_OFFSET: usize = 3;
const FLAGS_OFFSET: usize = 7;
const PTS_OFFSET: usize = 9;
const DTS_OFFSET: usize = 14;

const PTS_FLAG: u8 = 0x80;
const DTS_FLAG: u8 = 0x40;

/// Parse a 33-bit PTS or DTS timestamp from 5 bytes.
///
/// Layout: `[prefix(4) | ts32..30 | 1][ts29..22][ts21..15 | 1][ts14..7][ts6..0 | 1]`
pub fn parse_timestamp(data: &[u8]) -> Option<u64> {
    let b: &[u8; 5] = data.get(..5)?.try_into().ok()?;
    Some(
        ((b[0] as u64 & 0x0E) << 29)
            | ((b[1] as u64) << 22)
            | ((b[2] as u64 & 0xFE) << 14)
            | ((b[3] as u64) << 7)
            | ((b[4] as u64) >> 1),
    )
}

/// Check if a stream_id has an optional PES header (PTS/DTS fields).
fn has_optional_pes_header(stream_id: u8) -> bool {
    // Per ISO 13818-1 Table 2-18, these stream IDs do NOT have optional header:
    !matches!(
        stream_id,
        0xBC   // program_stream_map
        | 0xBE // padding_stream
        | 0xBF // private_stream_2
        | 0xF0 // ECM_stream
        | 0xF1 // EMM_stream
        | 0xFF // program_stream_directory
        | 0xF2 // DSMCC_stream
        | 0xF8 // ITU-T Rec. H.222.1 type E
    )
}

/// Timestamps and access flag of a PES-starting packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PesTimestamp {
    pub pts: Option<u64>,
    pub dts: Option<u64>,
    /// Random access indicator from the adaptation field
    pub random_access: bool,
}

impl PesTimestamp {
    /// Timestamp used for splice timing.
    ///
    /// When the DTS flag is set the DTS replaces the PTS, so splice points
    /// are measured in decode order.
    pub fn timing(&self) -> Option<u64> {
        self.dts.or(self.pts)
    }
}

/// Extract PTS/DTS and the random access indicator from a packet that
/// starts a PES packet.
///
/// Returns `None` for packets without PUSI or without the `00 00 01`
/// start code. Timestamp fields that do not fit in this packet read as absent.
pub fn extract_timestamp(packet: &TsPacket) -> Option<PesTimestamp> {
    if !packet.starts_pes() {
        return None;
    }
    let offset = packet.payload_offset()?;
    let data = packet.as_bytes();
    let random_access = packet.random_access_indicator();

    let stream_id = *data.get(offset + STREAM_ID_OFFSET)?;
    let flags_at = offset + FLAGS_OFFSET;
    if !has_optional_pes_header(stream_id) || flags_at >= TS_PACKET_SIZE {
        return Some(PesTimestamp {
            random_access,
            ..PesTimestamp::default()
        });
    }

    let flags = data[flags_at];
    let pts = if flags & PTS_FLAG != 0 {
        data.get(offset + PTS_OFFSET..).and_then(parse_timestamp)
    } else {
        None
    };
    let dts = if flags & DTS_FLAG != 0 {
        data.get(offset + DTS_OFFSET..).and_then(parse_timestamp)
    } else {
        None
    };

    Some(PesTimestamp {
        pts,
        dts,
        random_access,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_timestamp_bits() {
        let max = (1u64 << 33) - 1;
        for ts in [0, 1, 90_000, 0x1_2345_6789 & max, max] {
            assert_eq!(parse_timestamp(&encode_timestamp(0x2, ts)), Some(ts));
        }
    }

    #[test]
    fn test_pts_only() {
        let packet = TsPacket::new(pes_packet(0x100, Some(900_000), None, false));
        let ts = extract_timestamp(&packet).unwrap();
        assert_eq!(ts.pts, Some(900_000));
        assert_eq!(ts.dts, None);
        assert_eq!(ts.timing(), Some(900_000));
        assert!(!ts.random_access);
    }

    #[test]
    fn test_dts_overrides_pts() {
        let packet = TsPacket::new(pes_packet(0x100, Some(903_600), Some(900_000), false));
        let ts = extract_timestamp(&packet).unwrap();
        assert_eq!(ts.pts, Some(903_600));
        assert_eq!(ts.timing(), Some(900_000));
    }

    #[test]
    fn test_offsets_shift_with_adaptation_field() {
        let packet = TsPacket::new(pes_packet(0x100, Some(123_456), None, true));
        assert_eq!(packet.payload_offset(), Some(6));
        let ts = extract_timestamp(&packet).unwrap();
        assert_eq!(ts.pts, Some(123_456));
        assert!(ts.random_access);
    }

    #[test]
    fn test_requires_start_code() {
        let start = TsPacket::new(packet(0x100, true, 0, &[0x00, 0x00, 0x02, 0xE0]));
        assert!(extract_timestamp(&start).is_none());
        let continuation = TsPacket::new(packet(0x100, false, 1, &pes_header(Some(1), None)));
        assert!(extract_timestamp(&continuation).is_none());
    }

    #[test]
    fn test_no_timestamp_flags() {
        let packet = TsPacket::new(pes_packet(0x100, None, None, false));
        let ts = extract_timestamp(&packet).unwrap();
        assert_eq!(ts.timing(), None);
    }

    #[test]
    fn test_padding_stream_has_no_timestamps() {
        let mut header = pes_header(Some(1000), None);
        header[3] = 0xBE;
        let packet = TsPacket::new(packet(0x100, true, 0, &header));
        assert_eq!(extract_timestamp(&packet).unwrap().pts, None);
    }
}
