use tracing::trace;

use crate::descriptor::{Descriptors, TAG_CUE_IDENTIFIER};
use crate::{Result, TsError};

/// PMT table id
pub const PMT_TABLE_ID: u8 = 0x02;

/// Stream types the analyzer distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Mpeg2Video,
    Mpeg1Audio,
    Mpeg2Audio,
    PesPrivateData,
    AdtsAac,
    H264,
    H265,
    Ac3,
    Scte35,
    Eac3,
    Other(u8),
}

impl From<u8> for StreamType {
    fn from(value: u8) -> Self {
        match value {
            0x02 => StreamType::Mpeg2Video,
            0x03 => StreamType::Mpeg1Audio,
            0x04 => StreamType::Mpeg2Audio,
            0x06 => StreamType::PesPrivateData,
            0x0F => StreamType::AdtsAac,
            0x1B => StreamType::H264,
            0x24 => StreamType::H265,
            0x81 => StreamType::Ac3,
            0x86 => StreamType::Scte35,
            0x87 => StreamType::Eac3,
            v => StreamType::Other(v),
        }
    }
}

/// Elementary stream entry of a PMT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementaryStream {
    pub stream_type: u8,
    pub elementary_pid: u16,
    /// Raw ES_info descriptor loop
    pub descriptors: Vec<u8>,
}

impl ElementaryStream {
    pub fn kind(&self) -> StreamType {
        StreamType::from(self.stream_type)
    }

    /// Audio or video elementary stream.
    pub fn is_media(&self) -> bool {
        matches!(
            self.kind(),
            StreamType::Mpeg2Video
                | StreamType::H264
                | StreamType::H265
                | StreamType::Mpeg1Audio
                | StreamType::Mpeg2Audio
                | StreamType::AdtsAac
                | StreamType::Ac3
                | StreamType::Eac3
        )
    }

    pub fn descriptors(&self) -> Descriptors<'_> {
        Descriptors::new(&self.descriptors)
    }

    /// Descriptor tags in loop order.
    pub fn descriptor_tags(&self) -> Vec<u8> {
        self.descriptors().map(|d| d.tag).collect()
    }

    /// An SCTE-35 stream announced with a cue identifier descriptor.
    pub fn is_scte35_cue(&self) -> bool {
        self.kind() == StreamType::Scte35 && self.descriptors().any(|d| d.tag == TAG_CUE_IDENTIFIER)
    }
}

/// Program Map Table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pmt {
    pub program_number: u16,
    pub version_number: u8,
    pub section_number: u8,
    pub pcr_pid: u16,
    pub program_info: Vec<u8>,
    pub streams: Vec<ElementaryStream>,
}

impl Pmt {
    /// Parse a complete PMT section (header through CRC_32).
    ///
    /// An elementary stream entry that runs past the section ends the loop.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 16 {
            return Err(TsError::short(16, data.len()));
        }
        if data[0] != PMT_TABLE_ID {
            return Err(TsError::InvalidTableId {
                expected: PMT_TABLE_ID,
                actual: data[0],
            });
        }

        let section_length = (((data[1] as usize) & 0x0F) << 8) | data[2] as usize;
        if section_length < 13 {
            return Err(TsError::InvalidSectionLength {
                table_id: PMT_TABLE_ID,
                length: section_length,
            });
        }
        if data.len() < section_length + 3 {
            return Err(TsError::short(section_length + 3, data.len()));
        }
        let end = section_length + 3 - 4;

        let program_number = ((data[3] as u16) << 8) | data[4] as u16;
        let version_number = (data[5] >> 1) & 0x1F;
        let section_number = data[6];
        let pcr_pid = ((data[8] as u16 & 0x1F) << 8) | data[9] as u16;
        let program_info_length = (((data[10] as usize) & 0x0F) << 8) | data[11] as usize;

        let mut offset = 12;
        if offset + program_info_length > end {
            return Err(TsError::InvalidSectionLength {
                table_id: PMT_TABLE_ID,
                length: section_length,
            });
        }
        let program_info = data[offset..offset + program_info_length].to_vec();
        offset += program_info_length;

        let mut streams = Vec::new();
        while offset + 5 <= end {
            let stream_type = data[offset];
            let elementary_pid = ((data[offset + 1] as u16 & 0x1F) << 8) | data[offset + 2] as u16;
            let es_info_length =
                (((data[offset + 3] as usize) & 0x0F) << 8) | data[offset + 4] as usize;
            offset += 5;
            if offset + es_info_length > end {
                trace!(
                    program_number,
                    elementary_pid, es_info_length, "ES_info runs past section end"
                );
                break;
            }
            streams.push(ElementaryStream {
                stream_type,
                elementary_pid,
                descriptors: data[offset..offset + es_info_length].to_vec(),
            });
            offset += es_info_length;
        }

        Ok(Pmt {
            program_number,
            version_number,
            section_number,
            pcr_pid,
            program_info,
            streams,
        })
    }

    /// PIDs of H.264 video streams in table order.
    pub fn video_pids(&self) -> impl Iterator<Item = u16> + '_ {
        self.streams
            .iter()
            .filter(|s| s.kind() == StreamType::H264)
            .map(|s| s.elementary_pid)
    }
}

/// Association of an SCTE-35 PID with the video PID it cues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScteBinding {
    pub splice_pid: u16,
    /// Most recent H.264 PID seen before the SCTE-35 entry
    pub video_pid: Option<u16>,
    pub program_number: u16,
}

/// Derive SCTE-35 bindings from PMTs in the order they were received.
///
/// The video PID of each binding is the last H.264 (stream_type 0x1B)
/// entry seen before the SCTE-35 entry, counting entries of earlier PMTs
/// in the same traversal. One binding is produced per SCTE-35 PID.
pub fn bind_scte35<'a>(pmts: impl IntoIterator<Item = &'a Pmt>) -> Vec<ScteBinding> {
    let mut bindings: Vec<ScteBinding> = Vec::new();
    let mut video_pid = None;
    for pmt in pmts {
        for es in &pmt.streams {
            if es.kind() == StreamType::H264 {
                video_pid = Some(es.elementary_pid);
            } else if es.is_scte35_cue()
                && !bindings.iter().any(|b| b.splice_pid == es.elementary_pid)
            {
                bindings.push(ScteBinding {
                    splice_pid: es.elementary_pid,
                    video_pid,
                    program_number: pmt.program_number,
                });
            }
        }
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{EsSpec, pmt_section};

    #[test]
    fn test_parse_pmt() {
        let section = pmt_section(
            5,
            0,
            0x100,
            &[0x05, 0x04, b'C', b'U', b'E', b'I'],
            &[
                EsSpec::new(0x1B, 0x100),
                EsSpec::new(0x81, 0x101),
                EsSpec::scte35(0x1F4),
            ],
        );
        let pmt = Pmt::parse(&section).unwrap();
        assert_eq!(pmt.program_number, 5);
        assert_eq!(pmt.pcr_pid, 0x100);
        assert_eq!(pmt.program_info.len(), 6);
        assert_eq!(pmt.streams.len(), 3);
        assert_eq!(pmt.streams[1].kind(), StreamType::Ac3);
        assert!(pmt.streams[0].is_media() && pmt.streams[1].is_media());
        assert!(!pmt.streams[2].is_media());
        assert!(pmt.streams[2].is_scte35_cue());
        assert_eq!(pmt.streams[2].descriptor_tags(), vec![TAG_CUE_IDENTIFIER]);
        assert_eq!(pmt.video_pids().collect::<Vec<_>>(), vec![0x100]);
    }

    #[test]
    fn test_scte35_without_cue_descriptor_is_not_bound() {
        let section = pmt_section(
            1,
            0,
            0x100,
            &[],
            &[EsSpec::new(0x1B, 0x100), EsSpec::new(0x86, 0x1F4)],
        );
        let pmt = Pmt::parse(&section).unwrap();
        assert!(bind_scte35([&pmt]).is_empty());
    }

    #[test]
    fn test_binding_uses_most_recent_video_pid() {
        let section = pmt_section(
            1,
            0,
            0x100,
            &[],
            &[
                EsSpec::new(0x1B, 0x100),
                EsSpec::scte35(0x1F4),
                EsSpec::new(0x1B, 0x200),
                EsSpec::scte35(0x1F5),
            ],
        );
        let pmt = Pmt::parse(&section).unwrap();
        let bindings = bind_scte35([&pmt]);
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].video_pid, Some(0x100));
        assert_eq!(bindings[1].video_pid, Some(0x200));
    }

    #[test]
    fn test_binding_carries_video_pid_across_pmts() {
        let first = Pmt::parse(&pmt_section(1, 0, 0x100, &[], &[EsSpec::new(0x1B, 0x100)])).unwrap();
        let second = Pmt::parse(&pmt_section(2, 0, 0x300, &[], &[EsSpec::scte35(0x301)])).unwrap();
        let bindings = bind_scte35([&first, &second]);
        assert_eq!(
            bindings,
            vec![ScteBinding {
                splice_pid: 0x301,
                video_pid: Some(0x100),
                program_number: 2
            }]
        );
    }

    #[test]
    fn test_scte35_before_any_video() {
        let pmt = Pmt::parse(&pmt_section(1, 0, 0x100, &[], &[EsSpec::scte35(0x1F4)])).unwrap();
        assert_eq!(bind_scte35([&pmt])[0].video_pid, None);
    }

    #[test]
    fn test_truncated_es_loop_stops() {
        let mut section = pmt_section(1, 0, 0x100, &[], &[EsSpec::new(0x1B, 0x100)]);
        // claim 10 bytes of ES_info that the section does not contain
        section[12 + 3] = 0xF0;
        section[12 + 4] = 0x0A;
        let pmt = Pmt::parse(&section).unwrap();
        assert!(pmt.streams.is_empty());
    }
}
