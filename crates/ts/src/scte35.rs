//! SCTE-35 `splice_info_section` decoding.

use crate::{Result, TsError};

/// SCTE-35 table ID
pub const SCTE35_TABLE_ID: u8 = 0xFC;

/// Bytes from table_id through splice_command_type
pub const SCTE35_FIXED_HEADER_SIZE: usize = 14;

/// SCTE-35 splice command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpliceCommandType {
    SpliceNull,
    SpliceSchedule,
    SpliceInsert,
    TimeSignal,
    BandwidthReservation,
    PrivateCommand,
    Unknown(u8),
}

impl From<u8> for SpliceCommandType {
    fn from(value: u8) -> Self {
        match value {
            0x00 => SpliceCommandType::SpliceNull,
            0x04 => SpliceCommandType::SpliceSchedule,
            0x05 => SpliceCommandType::SpliceInsert,
            0x06 => SpliceCommandType::TimeSignal,
            0x07 => SpliceCommandType::BandwidthReservation,
            0xFF => SpliceCommandType::PrivateCommand,
            v => SpliceCommandType::Unknown(v),
        }
    }
}

/// Parsed splice command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpliceCommand {
    SpliceNull,
    SpliceInsert(SpliceInsert),
    TimeSignal(TimeSignal),
    /// Commands that are counted but not expanded, and encrypted commands
    Other(Vec<u8>),
}

/// SCTE-35 splice insert command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceInsert {
    pub splice_event_id: u32,
    pub splice_event_cancel_indicator: bool,
    pub out_of_network_indicator: bool,
    pub program_splice_flag: bool,
    pub splice_immediate_flag: bool,
    /// Program splice time in 90kHz ticks, before pts_adjustment
    pub splice_time: Option<u64>,
    /// Component splice times when program_splice_flag is clear
    pub components: Vec<SpliceComponent>,
    pub duration: Option<BreakDuration>,
    pub unique_program_id: u16,
    pub avail_num: u8,
    pub avails_expected: u8,
}

/// Per-component splice point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceComponent {
    pub component_tag: u8,
    pub splice_time: Option<u64>,
}

/// Break duration in a splice insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakDuration {
    pub auto_return: bool,
    /// Duration in 90kHz ticks (33-bit)
    pub duration: u64,
}

/// SCTE-35 time signal command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSignal {
    pub splice_time: Option<u64>,
}

/// First entry of the splice descriptor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceDescriptor {
    pub tag: u8,
    pub length: u8,
    /// 4-byte identifier, `CUEI` for standard descriptors
    pub identifier: [u8; 4],
    /// provider_avail_id for an avail descriptor (4 bytes after the identifier)
    pub provider_avail_id: Option<u32>,
}

impl SpliceDescriptor {
    pub fn identifier_str(&self) -> String {
        String::from_utf8_lossy(&self.identifier).into_owned()
    }
}

/// Bounds-checked big-endian cursor.
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(TsError::scte35(format!(
                "{what} truncated at byte {} of {}",
                self.pos,
                self.data.len()
            )));
        }
        let out = &self.data[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &str) -> Result<u16> {
        let b = self.take(2, what)?;
        Ok(((b[0] as u16) << 8) | b[1] as u16)
    }

    fn u32(&mut self, what: &str) -> Result<u32> {
        let b = self.take(4, what)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// 33-bit value stored in the low bit of `b[0]` and the following four bytes.
fn read_33(b: &[u8]) -> u64 {
    (((b[0] as u64) & 0x01) << 32)
        | ((b[1] as u64) << 24)
        | ((b[2] as u64) << 16)
        | ((b[3] as u64) << 8)
        | (b[4] as u64)
}

/// Parse a splice_time() structure.
fn parse_splice_time(cur: &mut Cursor<'_>) -> Result<Option<u64>> {
    let first = cur.u8("splice_time")?;
    if first & 0x80 == 0 {
        return Ok(None);
    }
    let rest = cur.take(4, "splice_time pts")?;
    Ok(Some(read_33(&[first, rest[0], rest[1], rest[2], rest[3]])))
}

/// Parse a break_duration() structure
fn parse_break_duration(cur: &mut Cursor<'_>) -> Result<BreakDuration> {
    let b = cur.take(5, "break_duration")?;
    Ok(BreakDuration {
        auto_return: (b[0] & 0x80) != 0,
        duration: read_33(b),
    })
}

/// Top-level SCTE-35 splice info section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpliceInfoSection {
    pub table_id: u8,
    pub protocol_version: u8,
    pub encrypted_packet: bool,
    pub encryption_algorithm: u8,
    pub pts_adjustment: u64,
    pub cw_index: u8,
    pub tier: u16,
    pub splice_command_length: u16,
    pub splice_command_type: SpliceCommandType,
    pub splice_command: SpliceCommand,
    pub descriptor: Option<SpliceDescriptor>,
}

impl SpliceInfoSection {
    /// Parse a SCTE-35 splice info section from a reassembled section.
    ///
    /// Sections shorter than the fixed header, with a foreign table id, or
    /// with a truncated splice_insert body are rejected.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < SCTE35_FIXED_HEADER_SIZE {
            return Err(TsError::short(SCTE35_FIXED_HEADER_SIZE, data.len()));
        }

        let table_id = data[0];
        if table_id != SCTE35_TABLE_ID {
            return Err(TsError::InvalidTableId {
                expected: SCTE35_TABLE_ID,
                actual: table_id,
            });
        }

        let protocol_version = data[3];
        let encrypted_packet = (data[4] & 0x80) != 0;
        let encryption_algorithm = (data[4] & 0x7E) >> 1;
        let pts_adjustment = read_33(&data[4..9]);
        let cw_index = data[9];
        let tier = ((data[10] as u16) << 4) | (data[11] as u16 >> 4);
        let splice_command_length = ((data[11] as u16 & 0x0F) << 8) | data[12] as u16;
        let splice_command_type = SpliceCommandType::from(data[13]);

        let cmd_start = SCTE35_FIXED_HEADER_SIZE;
        let cmd_end = if splice_command_length == 0xFFF {
            // Legacy unknown length: command runs to the CRC
            data.len().saturating_sub(4).max(cmd_start)
        } else {
            (cmd_start + splice_command_length as usize).min(data.len())
        };
        let cmd_data = &data[cmd_start..cmd_end];

        let splice_command = if encrypted_packet {
            SpliceCommand::Other(cmd_data.to_vec())
        } else {
            match splice_command_type {
                SpliceCommandType::SpliceNull => SpliceCommand::SpliceNull,
                SpliceCommandType::SpliceInsert => {
                    SpliceCommand::SpliceInsert(Self::parse_splice_insert(cmd_data)?)
                }
                SpliceCommandType::TimeSignal => {
                    let mut cur = Cursor::new(cmd_data);
                    SpliceCommand::TimeSignal(TimeSignal {
                        splice_time: parse_splice_time(&mut cur)?,
                    })
                }
                _ => SpliceCommand::Other(cmd_data.to_vec()),
            }
        };

        let descriptor = if splice_command_length == 0xFFF || encrypted_packet {
            None
        } else {
            Self::parse_first_descriptor(&data[cmd_end..])
        };

        Ok(SpliceInfoSection {
            table_id,
            protocol_version,
            encrypted_packet,
            encryption_algorithm,
            pts_adjustment,
            cw_index,
            tier,
            splice_command_length,
            splice_command_type,
            splice_command,
            descriptor,
        })
    }

    /// The splice_insert command, if this section carries one.
    pub fn splice_insert(&self) -> Option<&SpliceInsert> {
        match &self.splice_command {
            SpliceCommand::SpliceInsert(insert) => Some(insert),
            _ => None,
        }
    }

    fn parse_splice_insert(data: &[u8]) -> Result<SpliceInsert> {
        let mut cur = Cursor::new(data);
        let splice_event_id = cur.u32("splice_event_id")?;
        let splice_event_cancel_indicator = (cur.u8("cancel indicator")? & 0x80) != 0;

        let mut insert = SpliceInsert {
            splice_event_id,
            splice_event_cancel_indicator,
            out_of_network_indicator: false,
            program_splice_flag: false,
            splice_immediate_flag: false,
            splice_time: None,
            components: Vec::new(),
            duration: None,
            unique_program_id: 0,
            avail_num: 0,
            avails_expected: 0,
        };
        if splice_event_cancel_indicator {
            return Ok(insert);
        }

        let flags = cur.u8("splice_insert flags")?;
        insert.out_of_network_indicator = (flags & 0x80) != 0;
        insert.program_splice_flag = (flags & 0x40) != 0;
        let duration_flag = (flags & 0x20) != 0;
        insert.splice_immediate_flag = (flags & 0x10) != 0;

        if insert.program_splice_flag {
            if !insert.splice_immediate_flag {
                insert.splice_time = parse_splice_time(&mut cur)?;
            }
        } else {
            let count = cur.u8("component_count")?;
            for _ in 0..count {
                let component_tag = cur.u8("component_tag")?;
                let splice_time = if insert.splice_immediate_flag {
                    None
                } else {
                    parse_splice_time(&mut cur)?
                };
                insert.components.push(SpliceComponent {
                    component_tag,
                    splice_time,
                });
            }
        }

        if duration_flag {
            insert.duration = Some(parse_break_duration(&mut cur)?);
        }

        insert.unique_program_id = cur.u16("unique_program_id")?;
        insert.avail_num = cur.u8("avail_num")?;
        insert.avails_expected = cur.u8("avails_expected")?;
        Ok(insert)
    }

    /// Reads descriptor_loop_length and the first descriptor, if any.
    fn parse_first_descriptor(data: &[u8]) -> Option<SpliceDescriptor> {
        let mut cur = Cursor::new(data);
        let loop_length = cur.u16("descriptor_loop_length").ok()? as usize;
        if loop_length == 0 {
            return None;
        }
        let tag = cur.u8("splice_descriptor_tag").ok()?;
        let length = cur.u8("descriptor_length").ok()?;
        let identifier: [u8; 4] = cur.take(4, "identifier").ok()?.try_into().ok()?;
        let provider_avail_id = if length >= 8 {
            cur.u32("provider_avail_id").ok()
        } else {
            None
        };
        Some(SpliceDescriptor {
            tag,
            length,
            identifier,
            provider_avail_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    #[test]
    fn test_splice_insert_out_with_duration() {
        let spec = SpliceInsertSpec {
            event_id: 0x1234,
            pts_time: Some(8_100_000),
            duration: Some(2_700_000),
            auto_return: true,
            unique_program_id: 77,
            avail_num: 1,
            avails_expected: 2,
            avail_descriptor: Some(0xCAFE),
            ..SpliceInsertSpec::default()
        };
        let section = SpliceInfoSection::parse(&spec.encode()).unwrap();
        assert_eq!(section.splice_command_type, SpliceCommandType::SpliceInsert);
        assert_eq!(section.tier, 0xFFF);
        let insert = section.splice_insert().unwrap();
        assert_eq!(insert.splice_event_id, 0x1234);
        assert!(insert.out_of_network_indicator);
        assert!(insert.program_splice_flag);
        assert!(!insert.splice_immediate_flag);
        assert_eq!(insert.splice_time, Some(8_100_000));
        assert_eq!(
            insert.duration,
            Some(BreakDuration {
                auto_return: true,
                duration: 2_700_000
            })
        );
        assert_eq!(insert.unique_program_id, 77);
        assert_eq!(insert.avail_num, 1);
        assert_eq!(insert.avails_expected, 2);

        let descriptor = section.descriptor.unwrap();
        assert_eq!(descriptor.tag, 0x00);
        assert_eq!(descriptor.identifier_str(), "CUEI");
        assert_eq!(descriptor.provider_avail_id, Some(0xCAFE));
    }

    #[test]
    fn test_splice_insert_cancel() {
        let spec = SpliceInsertSpec {
            event_id: 9,
            cancel: true,
            ..SpliceInsertSpec::default()
        };
        let section = SpliceInfoSection::parse(&spec.encode()).unwrap();
        let insert = section.splice_insert().unwrap();
        assert!(insert.splice_event_cancel_indicator);
        assert!(!insert.out_of_network_indicator);
        assert_eq!(insert.splice_time, None);
    }

    #[test]
    fn test_splice_insert_immediate() {
        let spec = SpliceInsertSpec {
            immediate: true,
            out_of_network: false,
            ..SpliceInsertSpec::default()
        };
        let section = SpliceInfoSection::parse(&spec.encode()).unwrap();
        let insert = section.splice_insert().unwrap();
        assert!(insert.splice_immediate_flag);
        assert_eq!(insert.splice_time, None);
        assert!(section.descriptor.is_none());
    }

    #[test]
    fn test_pts_adjustment_kept_apart_from_time() {
        let spec = SpliceInsertSpec {
            pts_time: Some((1 << 33) - 10),
            pts_adjustment: 30,
            ..SpliceInsertSpec::default()
        };
        let section = SpliceInfoSection::parse(&spec.encode()).unwrap();
        assert_eq!(section.pts_adjustment, 30);
        assert_eq!(section.splice_insert().unwrap().splice_time, Some((1 << 33) - 10));
    }

    #[test]
    fn test_time_signal_and_null() {
        let section = SpliceInfoSection::parse(&time_signal_section(45_000)).unwrap();
        assert_eq!(section.splice_command_type, SpliceCommandType::TimeSignal);
        assert_eq!(
            section.splice_command,
            SpliceCommand::TimeSignal(TimeSignal {
                splice_time: Some(45_000)
            })
        );

        let section = SpliceInfoSection::parse(&splice_null_section()).unwrap();
        assert_eq!(section.splice_command, SpliceCommand::SpliceNull);
    }

    #[test]
    fn test_component_mode_insert() {
        let cmd = [
            0x00, 0x00, 0x00, 0x05, // splice_event_id
            0x7F, // not cancelled
            0x8F, // out_of_network, component mode, no duration, not immediate
            0x02, // component_count
            0x01, 0xFE, 0x00, 0x00, 0x00, 0x64, // tag 1 at pts 100
            0x02, 0x7F, // tag 2, time not specified
            0x00, 0x01, 0x00, 0x00, // unique_program_id, avail_num, avails_expected
        ];
        let section = SpliceInfoSection::parse(&splice_info_section(0, 0x05, &cmd, &[])).unwrap();
        let insert = section.splice_insert().unwrap();
        assert!(!insert.program_splice_flag);
        assert_eq!(
            insert.components,
            vec![
                SpliceComponent {
                    component_tag: 1,
                    splice_time: Some(100)
                },
                SpliceComponent {
                    component_tag: 2,
                    splice_time: None
                },
            ]
        );
        assert_eq!(insert.unique_program_id, 1);
    }

    #[test]
    fn test_truncated_header_rejected() {
        let data = SpliceInsertSpec::out(1, 0).encode();
        for len in 0..SCTE35_FIXED_HEADER_SIZE {
            assert!(matches!(
                SpliceInfoSection::parse(&data[..len]),
                Err(TsError::InsufficientData { .. })
            ));
        }
    }

    #[test]
    fn test_truncated_insert_rejected() {
        let data = SpliceInsertSpec::out(1, 0).encode();
        // Cut inside the splice_time
        assert!(matches!(
            SpliceInfoSection::parse(&data[..SCTE35_FIXED_HEADER_SIZE + 8]),
            Err(TsError::InvalidScte35(_))
        ));
    }

    #[test]
    fn test_invalid_table_id() {
        let data = vec![0x00; 20];
        assert!(matches!(
            SpliceInfoSection::parse(&data),
            Err(TsError::InvalidTableId { .. })
        ));
    }

    #[test]
    fn test_encrypted_command_not_expanded() {
        let mut data = SpliceInsertSpec::out(1, 0).encode();
        data[4] |= 0x80 | (0x02 << 1);
        let section = SpliceInfoSection::parse(&data).unwrap();
        assert!(section.encrypted_packet);
        assert_eq!(section.encryption_algorithm, 2);
        assert!(matches!(section.splice_command, SpliceCommand::Other(_)));
    }
}
