//! The two sequential passes over a capture.
//!
//! Pass one collects the program structure and time references. Pass two
//! follows the SCTE-35 and bound video PIDs, decoding splice messages and
//! matching each to the next PES start on its video PID.

use std::collections::HashMap;
use std::io::{Read, Seek};

use tracing::{debug, info, trace, warn};
use ts::{
    PID_PAT, PID_TDT, PacketReader, Pat, Pmt, Section, SectionAssembler, SeenSections,
    SpliceInfoSection, StreamTime, TsPacket, extract_timestamp,
};

use crate::Result;
use crate::config::ProjectConfig;
use crate::context::ParseContext;
use crate::event::SpliceEvent;
use crate::report::{LoopSection, Wraparound};
use crate::timeline::PtsUnwrapper;

const PMT_TABLE_ID: u8 = 0x02;
const SCTE35_TABLE_ID: u8 = 0xFC;
const TOT_TABLE_ID: u8 = 0x73;

/// Table dumps go to `debug!` when enabled for that table, else `trace!`.
macro_rules! table_dump {
    ($enabled:expr, $($arg:tt)+) => {
        if $enabled {
            debug!($($arg)+);
        } else {
            trace!($($arg)+);
        }
    };
}

/// Check the CRC when configured; a failure is recorded and the section dropped.
fn crc_ok(config: &ProjectConfig, ctx: &mut ParseContext, section: &Section) -> bool {
    if !config.verify_crc {
        return true;
    }
    match section.verify_crc() {
        Ok(()) => true,
        Err(e) => {
            warn!(
                pid = %format_args!("0x{:04x}", section.pid()),
                error = %e,
                "Dropping section"
            );
            ctx.anomalies
                .section_error(section.pid(), section.table_id(), e.to_string());
            false
        }
    }
}

/// Pass one: PAT, PMTs and TDT/TOT.
pub fn scan_tables<R: Read + Seek>(
    reader: &mut PacketReader<R>,
    config: &ProjectConfig,
    ctx: &mut ParseContext,
) -> Result<()> {
    let mut assembler = SectionAssembler::new();
    let mut seen = SeenSections::new();
    let mut pmt_pids: Vec<u16> = Vec::new();

    while let Some(packet) = reader.next_packet()? {
        let pid = packet.pid();
        let wanted = (pid == PID_PAT && ctx.pat.is_none()) || pid == PID_TDT || pmt_pids.contains(&pid);
        if !wanted {
            continue;
        }
        for section in assembler.push(&packet) {
            match pid {
                PID_PAT => {
                    if ctx.pat.is_none() && section.table_id() == 0x00 {
                        if let Some(pat) = handle_pat(config, ctx, &section) {
                            pmt_pids = pat
                                .pmt_pids()
                                .filter(|p| !config.skip_pmt_pids.contains(p))
                                .collect();
                            ctx.pat = Some(pat);
                        }
                    }
                }
                PID_TDT => handle_time(config, ctx, &section),
                _ => handle_pmt(config, ctx, &mut seen, &section),
            }
        }
    }

    ctx.packets_read = reader.packets_read();
    ctx.anomalies
        .sync_recoveries(reader.recoveries(), reader.exhausted_at());
    ctx.anomalies.discarded_sections(assembler.discarded());
    ctx.derive_bindings();

    info!(
        packets = ctx.packets_read,
        programs = ctx.pmts.len(),
        splice_pids = ctx.bindings.len(),
        "Program structure collected"
    );
    Ok(())
}

fn handle_pat(config: &ProjectConfig, ctx: &mut ParseContext, section: &Section) -> Option<Pat> {
    if !crc_ok(config, ctx, section) {
        return None;
    }
    match Pat::parse(section.data()) {
        Ok(pat) => {
            table_dump!(
                config.enable_debugs.pat,
                transport_stream_id = pat.transport_stream_id,
                version = pat.version_number,
                programs = ?pat.programs,
                network_pid = ?pat.network_pid,
                "PAT"
            );
            Some(pat)
        }
        Err(e) => {
            warn!(error = %e, "Invalid PAT");
            ctx.anomalies
                .section_error(section.pid(), section.table_id(), e.to_string());
            None
        }
    }
}

fn handle_pmt(
    config: &ProjectConfig,
    ctx: &mut ParseContext,
    seen: &mut SeenSections,
    section: &Section,
) {
    let pid = section.pid();
    if section.table_id() != PMT_TABLE_ID {
        trace!(pid = %format_args!("0x{:04x}", pid), table_id = section.table_id(), "Skipping non-PMT section");
        return;
    }
    if !crc_ok(config, ctx, section) || !seen.first_program_section(section) {
        return;
    }
    match Pmt::parse(section.data()) {
        Ok(pmt) => {
            let streams: Vec<(u8, u16)> = pmt
                .streams
                .iter()
                .map(|s| (s.stream_type, s.elementary_pid))
                .collect();
            table_dump!(
                config.enable_debugs.pmt,
                pid = %format_args!("0x{:04x}", pid),
                program_number = pmt.program_number,
                pcr_pid = pmt.pcr_pid,
                streams = ?streams,
                "PMT"
            );
            ctx.pmts.push((pid, pmt));
        }
        Err(e) => {
            warn!(pid = %format_args!("0x{:04x}", pid), error = %e, "Invalid PMT");
            ctx.anomalies.section_error(pid, section.table_id(), e.to_string());
        }
    }
}

fn handle_time(config: &ProjectConfig, ctx: &mut ParseContext, section: &Section) {
    // Only the TOT carries a CRC
    if section.table_id() == TOT_TABLE_ID && !crc_ok(config, ctx, section) {
        return;
    }
    match StreamTime::parse(section.data()) {
        Ok(time) => {
            trace!(table_id = time.table_id, utc = %time.utc, "Stream time");
            ctx.record_stream_time(time.utc);
        }
        Err(e) => {
            debug!(error = %e, "Ignoring time table section");
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    /// 1-based position among accepted messages on the splice PID
    message: usize,
    /// Index into the PID's event list for splice_insert messages
    event: Option<usize>,
}

/// Splice-hit bookkeeping for pass two.
#[derive(Debug, Default)]
struct SpliceTracker {
    assembler: SectionAssembler,
    seen: SeenSections,
    messages: HashMap<u16, usize>,
    pending: HashMap<u16, Vec<Pending>>,
    last_splice_pid: Option<u16>,
    /// All PES timestamps per video PID
    timeline: HashMap<u16, PtsUnwrapper>,
    /// I-frame timestamps per video PID
    iframes: HashMap<u16, PtsUnwrapper>,
}

impl SpliceTracker {
    fn on_splice_packet(&mut self, config: &ProjectConfig, ctx: &mut ParseContext, packet: &TsPacket) {
        let pid = packet.pid();
        let video_pid = ctx.binding(pid).and_then(|b| b.video_pid);
        for section in self.assembler.push(packet) {
            if section.table_id() != SCTE35_TABLE_ID {
                trace!(pid = %format_args!("0x{:04x}", pid), table_id = section.table_id(), "Skipping non-SCTE-35 section");
                continue;
            }
            if !crc_ok(config, ctx, &section) {
                continue;
            }
            if !self.seen.first_payload(&section) {
                if ctx.anomalies.loop_section(LoopSection {
                    splice_pid: pid,
                    video_pid,
                }) {
                    warn!(pid = %format_args!("0x{:04x}", pid), "Repeated splice section");
                }
                continue;
            }
            let splice = match SpliceInfoSection::parse(section.data()) {
                Ok(splice) => splice,
                Err(e) => {
                    warn!(pid = %format_args!("0x{:04x}", pid), error = %e, "Invalid splice section");
                    ctx.anomalies.section_error(pid, section.table_id(), e.to_string());
                    continue;
                }
            };
            ctx.command_counts.record(splice.splice_command_type);
            table_dump!(
                config.enable_debugs.scte,
                pid = %format_args!("0x{:04x}", pid),
                command = ?splice.splice_command_type,
                pts_adjustment = splice.pts_adjustment,
                command_body = ?splice.splice_command,
                "SCTE-35"
            );
            self.accept(ctx, pid, video_pid, &splice);
        }
    }

    fn accept(
        &mut self,
        ctx: &mut ParseContext,
        pid: u16,
        video_pid: Option<u16>,
        splice: &SpliceInfoSection,
    ) {
        let counter = self.messages.entry(pid).or_default();
        *counter += 1;
        let message = *counter;

        let pending = self.pending.entry(pid).or_default();
        if let Some(previous) = pending.last() {
            debug!(
                pid = %format_args!("0x{:04x}", pid),
                message = previous.message,
                "Splice message got no PES before the next one"
            );
            ctx.anomalies.no_splice_hit(pid, previous.message);
        }

        let event = splice.splice_insert().map(|insert| {
            let events = ctx.events.entry(pid).or_default();
            let ordinal = events.len() + 1;
            events.push(SpliceEvent::from_section(ordinal, pid, video_pid, splice, insert));
            events.len() - 1
        });
        pending.push(Pending { message, event });
        self.last_splice_pid = Some(pid);
    }

    fn on_video_packet(&mut self, ctx: &mut ParseContext, packet: &TsPacket) {
        let pid = packet.pid();
        let Some(timestamp) = extract_timestamp(packet) else {
            return;
        };
        let Some(pts) = timestamp.timing() else {
            return;
        };
        let full = self.timeline.entry(pid).or_default().push(pts);

        if timestamp.random_access {
            let iframes = self.iframes.entry(pid).or_default();
            let previous = iframes.previous();
            let wraps = iframes.wraps();
            iframes.push(pts);
            if let Some(previous_pts) = previous
                && iframes.wraps() > wraps
            {
                warn!(
                    video_pid = %format_args!("0x{:04x}", pid),
                    previous_pts,
                    pts,
                    "I-frame PTS wrapped around"
                );
                ctx.anomalies.wraparound(Wraparound {
                    splice_pid: self.last_splice_pid,
                    video_pid: pid,
                    previous_pts,
                    pts,
                });
            }
            ctx.first_iframe_pts.entry(pid).or_insert(full);
        }

        let first_pes = ctx.first_iframe_pts.get(&pid).copied().unwrap_or(full);
        let splice_pids: Vec<u16> = ctx.splice_pids_for(pid).collect();
        for splice_pid in splice_pids {
            let Some(pending) = self.pending.get_mut(&splice_pid) else {
                continue;
            };
            for message in pending.drain(..) {
                trace!(
                    splice_pid = %format_args!("0x{:04x}", splice_pid),
                    message = message.message,
                    hit = full,
                    "Splice hit"
                );
                if let Some(event) = message
                    .event
                    .and_then(|i| ctx.events.get_mut(&splice_pid)?.get_mut(i))
                {
                    event.resolve(first_pes, full);
                }
            }
        }
    }
}

/// Pass two: splice messages and their hits on the video PIDs.
pub fn scan_splices<R: Read + Seek>(
    reader: &mut PacketReader<R>,
    config: &ProjectConfig,
    ctx: &mut ParseContext,
) -> Result<()> {
    let mut tracker = SpliceTracker::default();

    while let Some(packet) = reader.next_packet()? {
        let pid = packet.pid();
        *ctx.pid_occurrences.entry(pid).or_default() += 1;
        if ctx.media_pids.contains(&pid) {
            ctx.scrambled
                .entry(pid)
                .or_insert_with(|| packet.scrambling().is_scrambled());
        }
        if ctx.is_splice_pid(pid) {
            tracker.on_splice_packet(config, ctx, &packet);
        } else if ctx.is_video_pid(pid) {
            tracker.on_video_packet(ctx, &packet);
        }
    }

    ctx.anomalies
        .discarded_sections(tracker.assembler.discarded());
    let unresolved: usize = tracker.pending.values().map(Vec::len).sum();
    info!(
        messages = ctx.command_counts.total(),
        inserts = ctx.command_counts.insert,
        unresolved,
        "Splice messages collected"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use ts::test_support::*;

    const VIDEO: u16 = 0x100;
    const SPLICE: u16 = 0x1F4;
    const PMT_PID: u16 = 0x1000;

    fn header() -> Vec<[u8; 188]> {
        let mut packets = packetize(PID_PAT, &pat_section(&[(1, PMT_PID)]));
        packets.extend(packetize(
            PMT_PID,
            &pmt_section(
                1,
                0,
                VIDEO,
                &[],
                &[EsSpec::new(0x1B, VIDEO), EsSpec::new(0x81, 0x101), EsSpec::scte35(SPLICE)],
            ),
        ));
        packets
    }

    fn run(packets: &[[u8; 188]]) -> ParseContext {
        let config = ProjectConfig::default();
        let mut ctx = ParseContext::new(config.allowed_ad_duration.clone());
        let data = concat(packets);
        let mut reader = PacketReader::new(Cursor::new(&data)).unwrap();
        scan_tables(&mut reader, &config, &mut ctx).unwrap();
        let mut reader = PacketReader::new(Cursor::new(&data)).unwrap();
        scan_splices(&mut reader, &config, &mut ctx).unwrap();
        ctx
    }

    #[test]
    fn test_tables_and_binding() {
        let mut packets = header();
        packets.extend(packetize(PID_TDT, &tdt_section(60_000, 8, 30, 0)));
        let ctx = run(&packets);
        assert!(ctx.pat.is_some());
        assert_eq!(ctx.pmts.len(), 1);
        assert_eq!(ctx.bindings.len(), 1);
        assert_eq!(ctx.bindings[0].video_pid, Some(VIDEO));
        assert!(ctx.stream_clock().first_utc.is_some());
    }

    #[test]
    fn test_skip_pmt_pid() {
        let config = ProjectConfig {
            skip_pmt_pids: vec![PMT_PID],
            ..ProjectConfig::default()
        };
        let mut ctx = ParseContext::new(vec![30]);
        let data = concat(&header());
        let mut reader = PacketReader::new(Cursor::new(&data)).unwrap();
        scan_tables(&mut reader, &config, &mut ctx).unwrap();
        assert!(ctx.pmts.is_empty());
        assert!(ctx.bindings.is_empty());
    }

    #[test]
    fn test_splice_hit_resolution() {
        let mut packets = header();
        packets.push(pes_packet(VIDEO, Some(90_000), None, true));
        packets.extend(packetize(SPLICE, &SpliceInsertSpec::out(1, 180_000).encode()));
        packets.push(pes_packet(VIDEO, Some(93_003), None, false));
        let ctx = run(&packets);

        let events = &ctx.events[&SPLICE];
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].first_pes_pts, Some(90_000));
        assert_eq!(events[0].splice_hit_pts, Some(93_003));
        assert_eq!(events[0].start_pts(), Some(180_000));
        assert_eq!(ctx.command_counts.insert, 1);
        assert_eq!(ctx.pid_occurrences[&VIDEO], 2);
    }

    #[test]
    fn test_scrambling_of_audio_and_video() {
        let mut packets = header();
        packets.push(pes_packet(VIDEO, Some(90_000), None, true));
        let mut audio = pes_packet(0x101, Some(90_000), None, false);
        audio[3] |= 0xC0; // odd key
        packets.push(audio);
        let ctx = run(&packets);
        assert!(!ctx.scrambled[&VIDEO]);
        assert!(ctx.scrambled[&0x101]);
        assert!(!ctx.scrambled.contains_key(&SPLICE));
    }

    #[test]
    fn test_no_splice_hit_before_next() {
        let mut packets = header();
        packets.extend(packetize(SPLICE, &SpliceInsertSpec::out(1, 180_000).encode()));
        packets.extend(packetize(SPLICE, &splice_null_section()));
        packets.push(pes_packet(VIDEO, Some(90_000), None, true));
        let ctx = run(&packets);
        let report = ctx.anomalies.build();
        assert_eq!(report.no_splice_hit[&SPLICE], vec![1]);
        assert_eq!(report.checklist.splice_pes, crate::report::Check::Fail);
    }

    #[test]
    fn test_repeated_section_is_loop() {
        let mut packets = header();
        let section = SpliceInsertSpec::out(1, 180_000).encode();
        packets.extend(packetize(SPLICE, &section));
        packets.push(pes_packet(VIDEO, Some(90_000), None, true));
        packets.extend(packetize(SPLICE, &section));
        packets.extend(packetize(SPLICE, &section));
        let ctx = run(&packets);
        assert_eq!(ctx.events[&SPLICE].len(), 1);
        let report = ctx.anomalies.build();
        assert_eq!(
            report.loop_sections,
            vec![LoopSection {
                splice_pid: SPLICE,
                video_pid: Some(VIDEO)
            }]
        );
    }

    #[test]
    fn test_corrupt_splice_section() {
        let mut packets = header();
        let mut section = SpliceInsertSpec::out(1, 180_000).encode();
        let last = section.len() - 1;
        section[last] ^= 0x55;
        packets.extend(packetize(SPLICE, &section));
        let ctx = run(&packets);
        assert!(!ctx.events.contains_key(&SPLICE));
        let report = ctx.anomalies.build();
        assert_eq!(report.section_errors.len(), 1);
        assert_eq!(report.section_errors[0].table_id, SCTE35_TABLE_ID);
    }

    #[test]
    fn test_iframe_wraparound() {
        let mut packets = header();
        packets.extend(packetize(SPLICE, &SpliceInsertSpec::out(1, 180_000).encode()));
        packets.push(pes_packet(VIDEO, Some((1 << 33) - 90_000), None, true));
        packets.push(pes_packet(VIDEO, Some(1_000), None, true));
        let ctx = run(&packets);
        let report = ctx.anomalies.build();
        assert_eq!(report.wraparounds.len(), 1);
        assert_eq!(report.wraparounds[0].splice_pid, Some(SPLICE));
        assert_eq!(report.wraparounds[0].pts, 1_000);
        assert_eq!(ctx.first_iframe_pts[&VIDEO], (1 << 33) - 90_000);
    }
}
