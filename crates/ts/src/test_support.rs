//! Synthetic transport stream builders.
//!
//! This module is available for local ts tests and optionally for downstream
//! crate tests when the `test-utils` feature is enabled.

use crate::crc32::append_crc;
use crate::packet::{SYNC_BYTE, TS_PACKET_SIZE};

/// Build a payload-only packet carrying `payload` after the header, padded with 0xFF.
pub fn packet(pid: u16, pusi: bool, cc: u8, payload: &[u8]) -> [u8; TS_PACKET_SIZE] {
    let mut data = [0xFFu8; TS_PACKET_SIZE];
    data[0] = SYNC_BYTE;
    data[1] = ((pid >> 8) as u8 & 0x1F) | if pusi { 0x40 } else { 0 };
    data[2] = pid as u8;
    data[3] = 0x10 | (cc & 0x0F);
    let n = payload.len().min(TS_PACKET_SIZE - 4);
    data[4..4 + n].copy_from_slice(&payload[..n]);
    data
}

/// Build a packet with an adaptation field body `af` (flags byte first) followed by `payload`.
pub fn packet_with_af(pid: u16, pusi: bool, af: &[u8], payload: &[u8]) -> [u8; TS_PACKET_SIZE] {
    let mut data = [0xFFu8; TS_PACKET_SIZE];
    data[0] = SYNC_BYTE;
    data[1] = ((pid >> 8) as u8 & 0x1F) | if pusi { 0x40 } else { 0 };
    data[2] = pid as u8;
    data[3] = 0x30;
    data[4] = af.len() as u8;
    data[5..5 + af.len()].copy_from_slice(af);
    let start = 5 + af.len();
    let n = payload.len().min(TS_PACKET_SIZE - start);
    data[start..start + n].copy_from_slice(&payload[..n]);
    data
}

/// Split a section into packets: a PUSI packet with a zero pointer field,
/// then continuation packets.
pub fn packetize(pid: u16, section: &[u8]) -> Vec<[u8; TS_PACKET_SIZE]> {
    let first_len = section.len().min(TS_PACKET_SIZE - 5);
    let mut first = vec![0x00];
    first.extend_from_slice(&section[..first_len]);
    let mut packets = vec![packet(pid, true, 0, &first)];
    for (i, chunk) in section[first_len..].chunks(TS_PACKET_SIZE - 4).enumerate() {
        packets.push(packet(pid, false, (i + 1) as u8, chunk));
    }
    packets
}

/// Flatten packets into a byte stream.
pub fn concat(packets: &[[u8; TS_PACKET_SIZE]]) -> Vec<u8> {
    packets.iter().flat_map(|p| p.iter().copied()).collect()
}

/// Encode a 33-bit timestamp into the 5-byte PES marker layout.
pub fn encode_timestamp(prefix: u8, ts: u64) -> [u8; 5] {
    [
        (prefix << 4) | (((ts >> 29) as u8) & 0x0E) | 0x01,
        (ts >> 22) as u8,
        (((ts >> 14) as u8) & 0xFE) | 0x01,
        (ts >> 7) as u8,
        (((ts << 1) as u8) & 0xFE) | 0x01,
    ]
}

/// PES header bytes (start code through timestamps) for a video stream.
pub fn pes_header(pts: Option<u64>, dts: Option<u64>) -> Vec<u8> {
    let mut out = vec![0x00, 0x00, 0x01, 0xE0, 0x00, 0x00, 0x80];
    match (pts, dts) {
        (Some(pts), Some(dts)) => {
            out.extend_from_slice(&[0xC0, 10]);
            out.extend_from_slice(&encode_timestamp(0x3, pts));
            out.extend_from_slice(&encode_timestamp(0x1, dts));
        }
        (Some(pts), None) => {
            out.extend_from_slice(&[0x80, 5]);
            out.extend_from_slice(&encode_timestamp(0x2, pts));
        }
        _ => out.extend_from_slice(&[0x00, 0]),
    }
    out
}

/// A PES-starting packet. With `rai` the packet carries a one-byte
/// adaptation field with the random access indicator set.
pub fn pes_packet(pid: u16, pts: Option<u64>, dts: Option<u64>, rai: bool) -> [u8; TS_PACKET_SIZE] {
    let header = pes_header(pts, dts);
    if rai {
        packet_with_af(pid, true, &[0x40], &header)
    } else {
        packet(pid, true, 0, &header)
    }
}

/// Long-form PSI section with CRC_32.
pub fn long_section(table_id: u8, extension: u16, section_number: u8, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut out = vec![
        table_id,
        0xB0 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
        (extension >> 8) as u8,
        extension as u8,
        0xC1,
        section_number,
        section_number,
    ];
    out.extend_from_slice(body);
    append_crc(&mut out);
    out
}

/// PAT section from `(program_number, pmt_pid)` pairs.
pub fn pat_section(programs: &[(u16, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    for &(program, pid) in programs {
        body.extend_from_slice(&[
            (program >> 8) as u8,
            program as u8,
            0xE0 | ((pid >> 8) as u8 & 0x1F),
            pid as u8,
        ]);
    }
    long_section(0x00, 1, 0, &body)
}

/// One elementary stream of a synthetic PMT.
#[derive(Debug, Clone)]
pub struct EsSpec {
    pub stream_type: u8,
    pub pid: u16,
    pub descriptors: Vec<u8>,
}

impl EsSpec {
    pub fn new(stream_type: u8, pid: u16) -> Self {
        Self {
            stream_type,
            pid,
            descriptors: Vec::new(),
        }
    }

    /// SCTE-35 stream with a cue identifier descriptor.
    pub fn scte35(pid: u16) -> Self {
        Self {
            stream_type: 0x86,
            pid,
            descriptors: vec![0x8A, 0x01, 0x00],
        }
    }
}

/// PMT section.
pub fn pmt_section(
    program_number: u16,
    section_number: u8,
    pcr_pid: u16,
    program_info: &[u8],
    streams: &[EsSpec],
) -> Vec<u8> {
    let mut body = vec![
        0xE0 | ((pcr_pid >> 8) as u8 & 0x1F),
        pcr_pid as u8,
        0xF0 | ((program_info.len() >> 8) as u8 & 0x0F),
        program_info.len() as u8,
    ];
    body.extend_from_slice(program_info);
    for es in streams {
        body.extend_from_slice(&[
            es.stream_type,
            0xE0 | ((es.pid >> 8) as u8 & 0x1F),
            es.pid as u8,
            0xF0 | ((es.descriptors.len() >> 8) as u8 & 0x0F),
            es.descriptors.len() as u8,
        ]);
        body.extend_from_slice(&es.descriptors);
    }
    long_section(0x02, program_number, section_number, &body)
}

fn splice_time(pts: Option<u64>) -> Vec<u8> {
    match pts {
        Some(pts) => vec![
            0xFE | ((pts >> 32) as u8 & 0x01),
            (pts >> 24) as u8,
            (pts >> 16) as u8,
            (pts >> 8) as u8,
            pts as u8,
        ],
        None => vec![0x7F],
    }
}

/// splice_info_section around an already encoded command.
pub fn splice_info_section(
    pts_adjustment: u64,
    command_type: u8,
    command: &[u8],
    descriptors: &[u8],
) -> Vec<u8> {
    let section_length = 11 + command.len() + 2 + descriptors.len() + 4;
    let mut out = vec![
        0xFC,
        0x30 | ((section_length >> 8) as u8 & 0x0F),
        section_length as u8,
        0x00, // protocol_version
        (pts_adjustment >> 32) as u8 & 0x01,
        (pts_adjustment >> 24) as u8,
        (pts_adjustment >> 16) as u8,
        (pts_adjustment >> 8) as u8,
        pts_adjustment as u8,
        0x00, // cw_index
        0xFF, // tier (12 bits, all ones)
        0xF0 | ((command.len() >> 8) as u8 & 0x0F),
        command.len() as u8,
        command_type,
    ];
    out.extend_from_slice(command);
    out.extend_from_slice(&[(descriptors.len() >> 8) as u8, descriptors.len() as u8]);
    out.extend_from_slice(descriptors);
    append_crc(&mut out);
    out
}

/// Field values for a synthetic splice_insert section.
#[derive(Debug, Clone)]
pub struct SpliceInsertSpec {
    pub event_id: u32,
    pub cancel: bool,
    pub out_of_network: bool,
    pub immediate: bool,
    pub pts_time: Option<u64>,
    pub duration: Option<u64>,
    pub auto_return: bool,
    pub unique_program_id: u16,
    pub avail_num: u8,
    pub avails_expected: u8,
    pub pts_adjustment: u64,
    /// provider_avail_id of a trailing avail descriptor
    pub avail_descriptor: Option<u32>,
}

impl Default for SpliceInsertSpec {
    fn default() -> Self {
        Self {
            event_id: 1,
            cancel: false,
            out_of_network: true,
            immediate: false,
            pts_time: None,
            duration: None,
            auto_return: false,
            unique_program_id: 0,
            avail_num: 0,
            avails_expected: 0,
            pts_adjustment: 0,
            avail_descriptor: None,
        }
    }
}

impl SpliceInsertSpec {
    /// Splice-out at `pts`.
    pub fn out(event_id: u32, pts: u64) -> Self {
        Self {
            event_id,
            pts_time: Some(pts),
            ..Self::default()
        }
    }

    /// Splice-in (return to network) at `pts`.
    pub fn back_in(event_id: u32, pts: u64) -> Self {
        Self {
            event_id,
            out_of_network: false,
            pts_time: Some(pts),
            ..Self::default()
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut cmd = self.event_id.to_be_bytes().to_vec();
        cmd.push(if self.cancel { 0xFF } else { 0x7F });
        if !self.cancel {
            let mut flags = 0x4F; // program_splice_flag + reserved bits
            if self.out_of_network {
                flags |= 0x80;
            }
            if self.duration.is_some() {
                flags |= 0x20;
            }
            if self.immediate {
                flags |= 0x10;
            }
            cmd.push(flags);
            if !self.immediate {
                cmd.extend_from_slice(&splice_time(self.pts_time));
            }
            if let Some(duration) = self.duration {
                cmd.extend_from_slice(&[
                    if self.auto_return { 0xFE } else { 0x7E } | ((duration >> 32) as u8 & 0x01),
                    (duration >> 24) as u8,
                    (duration >> 16) as u8,
                    (duration >> 8) as u8,
                    duration as u8,
                ]);
            }
            cmd.extend_from_slice(&self.unique_program_id.to_be_bytes());
            cmd.push(self.avail_num);
            cmd.push(self.avails_expected);
        }
        let mut descriptors = Vec::new();
        if let Some(avail_id) = self.avail_descriptor {
            descriptors.extend_from_slice(&[0x00, 0x08]);
            descriptors.extend_from_slice(b"CUEI");
            descriptors.extend_from_slice(&avail_id.to_be_bytes());
        }
        splice_info_section(self.pts_adjustment, 0x05, &cmd, &descriptors)
    }
}

/// splice_null section.
pub fn splice_null_section() -> Vec<u8> {
    splice_info_section(0, 0x00, &[], &[])
}

/// time_signal section.
pub fn time_signal_section(pts: u64) -> Vec<u8> {
    splice_info_section(0, 0x06, &splice_time(Some(pts)), &[])
}

fn bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// TDT section for the given Modified Julian Date and UTC time of day.
pub fn tdt_section(mjd: u16, hour: u8, minute: u8, second: u8) -> Vec<u8> {
    vec![
        0x70,
        0x70,
        0x05,
        (mjd >> 8) as u8,
        mjd as u8,
        bcd(hour),
        bcd(minute),
        bcd(second),
    ]
}
