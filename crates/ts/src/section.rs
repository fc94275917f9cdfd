//! PSI section reassembly.
//!
//! Sections may span several packets. A section starts in a packet with
//! `payload_unit_start_indicator` set, after the pointer field, and is
//! complete once `section_length + 3` bytes have been collected.

use std::collections::{HashMap, HashSet};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::crc32::{crc32_mpeg2, stored_crc};
use crate::packet::TsPacket;
use crate::{Result, TsError};

/// Bytes of table_id + section_length preceding the section body
pub const SECTION_HEADER_SIZE: usize = 3;

/// A complete section as carried on one PID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pid: u16,
    data: Bytes,
}

impl Section {
    pub fn new(pid: u16, data: Bytes) -> Self {
        Self { pid, data }
    }

    pub fn pid(&self) -> u16 {
        self.pid
    }

    /// Full section bytes, header through CRC_32
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn table_id(&self) -> u8 {
        self.data[0]
    }

    /// 12-bit section_length
    pub fn section_length(&self) -> usize {
        section_length(&self.data)
    }

    /// table_id_extension of a long-form section (program_number for a PMT).
    pub fn table_id_extension(&self) -> Option<u16> {
        let bytes = self.data.get(3..5)?;
        Some(((bytes[0] as u16) << 8) | bytes[1] as u16)
    }

    /// section_number of a long-form section.
    pub fn section_number(&self) -> Option<u8> {
        self.data.get(6).copied()
    }

    /// Section bytes with the trailing CRC_32 removed.
    pub fn without_crc(&self) -> &[u8] {
        &self.data[..self.data.len().saturating_sub(4)]
    }

    /// Check the trailing CRC_32.
    pub fn verify_crc(&self) -> Result<()> {
        let expected = stored_crc(&self.data).ok_or(TsError::InvalidSectionLength {
            table_id: self.table_id(),
            length: self.data.len(),
        })?;
        let computed = crc32_mpeg2(self.without_crc());
        if expected != computed {
            return Err(TsError::CrcMismatch {
                table_id: self.table_id(),
                expected,
                computed,
            });
        }
        Ok(())
    }
}

fn section_length(data: &[u8]) -> usize {
    (((data[1] as usize) & 0x0F) << 8) | data[2] as usize
}

/// Per-PID section reassembly.
#[derive(Debug, Default)]
pub struct SectionAssembler {
    partial: HashMap<u16, BytesMut>,
    discarded: u64,
}

impl SectionAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one packet; returns every section it completes.
    ///
    /// Continuation packets on a PID with no section in progress are ignored.
    pub fn push(&mut self, packet: &TsPacket) -> Vec<Section> {
        let mut completed = Vec::new();
        let Some(payload) = packet.payload() else {
            return completed;
        };
        let pid = packet.pid();

        if packet.payload_unit_start_indicator() {
            let pointer = payload[0] as usize;
            let body = &payload[1..];
            if pointer > body.len() {
                debug!(pid, pointer, "Pointer field past end of payload");
                self.drop_partial(pid);
                return completed;
            }
            let (tail, head) = body.split_at(pointer);
            if let Some(mut partial) = self.partial.remove(&pid) {
                partial.extend_from_slice(tail);
                self.accumulate(pid, partial, &mut completed);
                self.drop_partial(pid);
            }
            self.accumulate(pid, BytesMut::from(head), &mut completed);
        } else if let Some(mut partial) = self.partial.remove(&pid) {
            partial.extend_from_slice(payload);
            self.accumulate(pid, partial, &mut completed);
        }

        completed
    }

    /// Number of partial sections abandoned because a new section started
    /// before they completed.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    fn drop_partial(&mut self, pid: u16) {
        if let Some(partial) = self.partial.remove(&pid) {
            trace!(pid, collected = partial.len(), "Discarding incomplete section");
            self.discarded += 1;
        }
    }

    fn accumulate(&mut self, pid: u16, mut buf: BytesMut, completed: &mut Vec<Section>) {
        loop {
            // 0xFF after a section is stuffing
            if buf.is_empty() || buf[0] == 0xFF {
                return;
            }
            if buf.len() < SECTION_HEADER_SIZE {
                self.partial.insert(pid, buf);
                return;
            }
            let total = section_length(&buf) + SECTION_HEADER_SIZE;
            if buf.len() < total {
                self.partial.insert(pid, buf);
                return;
            }
            let section = buf.split_to(total).freeze();
            trace!(pid, table_id = section[0], len = total, "Section complete");
            completed.push(Section::new(pid, section));
        }
    }
}

/// Registry of sections already accepted, for duplicate detection.
#[derive(Debug, Default)]
pub struct SeenSections {
    program_sections: HashSet<(u16, u8)>,
    payloads: HashSet<Bytes>,
}

impl SeenSections {
    pub fn new() -> Self {
        Self::default()
    }

    /// True the first time a `(program_number, section_number)` pair is seen.
    pub fn first_program_section(&mut self, section: &Section) -> bool {
        match (section.table_id_extension(), section.section_number()) {
            (Some(program), Some(number)) => self.program_sections.insert((program, number)),
            _ => false,
        }
    }

    /// True the first time this section content (CRC_32 excluded) is seen.
    pub fn first_payload(&mut self, section: &Section) -> bool {
        let key = section
            .data()
            .slice(..section.data().len().saturating_sub(4));
        self.payloads.insert(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;
    use proptest::prelude::*;

    fn private_section(body_len: usize, fill: u8) -> Vec<u8> {
        let section_length = body_len;
        let mut out = vec![
            0xC0,
            0x30 | ((section_length >> 8) as u8 & 0x0F),
            section_length as u8,
        ];
        out.extend(std::iter::repeat_n(fill, body_len));
        out
    }

    fn assemble(packets: &[[u8; 188]]) -> (Vec<Section>, SectionAssembler) {
        let mut asm = SectionAssembler::new();
        let mut out = Vec::new();
        for p in packets {
            out.extend(asm.push(&TsPacket::new(*p)));
        }
        (out, asm)
    }

    #[test]
    fn test_single_packet_section() {
        let section = pat_section(&[(1, 0x1000)]);
        let (sections, _) = assemble(&packetize(0, &section));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].data().as_ref(), section.as_slice());
        assert_eq!(sections[0].table_id(), 0x00);
        assert!(sections[0].verify_crc().is_ok());
    }

    #[test]
    fn test_adaptation_field_offset() {
        let section = pat_section(&[(1, 0x1000)]);
        let mut payload = vec![0x00];
        payload.extend_from_slice(&section);
        let packet = packet_with_af(0, true, &[0x00, 0x00, 0x00, 0x00], &payload);
        let (sections, _) = assemble(&[packet]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].data().as_ref(), section.as_slice());
    }

    #[test]
    fn test_pointer_field_skips_bytes() {
        let section = pat_section(&[(1, 0x1000)]);
        let mut payload = vec![0x02, 0xAA, 0xBB];
        payload.extend_from_slice(&section);
        let (sections, _) = assemble(&[packet(0, true, 0, &payload)]);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].data().as_ref(), section.as_slice());
    }

    #[test]
    fn test_interrupted_section_discarded() {
        let long = private_section(400, 0x11);
        let packets = packetize(0x200, &long);
        let short = private_section(10, 0x22);
        let mut sequence = vec![packets[0]];
        sequence.extend(packetize(0x200, &short));
        let (sections, asm) = assemble(&sequence);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].data().as_ref(), short.as_slice());
        assert_eq!(asm.discarded(), 1);
    }

    #[test]
    fn test_continuation_without_start_ignored() {
        let section = private_section(400, 0x11);
        let packets = packetize(0x200, &section);
        let (sections, _) = assemble(&packets[1..]);
        assert!(sections.is_empty());
    }

    #[test]
    fn test_two_sections_in_one_packet() {
        let a = private_section(5, 0x01);
        let b = private_section(6, 0x02);
        let mut payload = vec![0x00];
        payload.extend_from_slice(&a);
        payload.extend_from_slice(&b);
        let (sections, _) = assemble(&[packet(0x200, true, 0, &payload)]);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].data().as_ref(), b.as_slice());
    }

    #[test]
    fn test_crc_mismatch() {
        let mut section = pat_section(&[(1, 0x1000)]);
        let last = section.len() - 1;
        section[last] ^= 0x01;
        let s = Section::new(0, Bytes::from(section));
        assert!(matches!(s.verify_crc(), Err(TsError::CrcMismatch { .. })));
    }

    #[test]
    fn test_program_section_dedup() {
        let mut seen = SeenSections::new();
        let a = Section::new(0x1000, pmt_section(1, 0, 0x100, &[], &[]).into());
        let b = Section::new(0x1000, pmt_section(1, 1, 0x100, &[], &[]).into());
        assert!(seen.first_program_section(&a));
        assert!(!seen.first_program_section(&a));
        assert!(seen.first_program_section(&b));
    }

    #[test]
    fn test_payload_dedup_ignores_crc() {
        let mut seen = SeenSections::new();
        let section = SpliceInsertSpec::out(7, 90_000).encode();
        let mut altered = section.clone();
        let last = altered.len() - 1;
        altered[last] ^= 0xFF;
        assert!(seen.first_payload(&Section::new(0x500, section.into())));
        assert!(!seen.first_payload(&Section::new(0x500, altered.into())));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_reassembly_round_trip(body_len in 1usize..(5 * 184 - 4), fill in 0u8..0xFF) {
            let section = private_section(body_len, fill);
            let packets = packetize(0x300, &section);
            prop_assert!(packets.len() <= 5);
            let (sections, _) = assemble(&packets);
            prop_assert_eq!(sections.len(), 1);
            prop_assert_eq!(sections[0].data().as_ref(), section.as_slice());
        }
    }
}
