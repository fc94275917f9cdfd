//! Report structures handed to the rendering layer.
//!
//! Every map is a `BTreeMap` so serialization order is stable across runs.

use std::collections::BTreeMap;

use serde::Serialize;
use ts::{Pmt, ScteBinding, SyncRecovery};

use crate::config::ConfigFinding;
use crate::event::SpliceCommandCounts;
use crate::media::MediaReport;
use crate::reconcile::{AdSpot, AnnotatedEvent, SpuriousEvent, StreamTimeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Check {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Check {
    fn passes(ok: bool) -> Self {
        if ok { Self::Ok } else { Self::Fail }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncByteError {
    pub lost_at: u64,
    pub resumed_at: u64,
    pub skipped: u64,
}

impl From<&SyncRecovery> for SyncByteError {
    fn from(r: &SyncRecovery) -> Self {
        Self {
            lost_at: r.lost_at,
            resumed_at: r.resumed_at,
            skipped: r.skipped(),
        }
    }
}

/// A byte-identical SCTE-35 section seen again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LoopSection {
    pub splice_pid: u16,
    pub video_pid: Option<u16>,
}

/// I-frame PTS going backwards on a video PID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Wraparound {
    /// Last splice PID that carried a message before the wrap
    pub splice_pid: Option<u16>,
    pub video_pid: u16,
    pub previous_pts: u64,
    pub pts: u64,
}

/// A spot starting before the previous one ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Clash {
    pub previous_ordinal: usize,
    pub ordinal: usize,
    pub start_pts: u64,
    pub previous_end_pts: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OnidError {
    /// Nothing to sequence: no events, or only cancelled/unresolved ones
    NoEligibleEvents,
    AllOutOfNetwork,
    AllReturnToNetwork,
    /// A splice-out not immediately followed by a splice-in
    UnpairedOut { index: usize },
}

/// A section that was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionError {
    pub pid: u16,
    pub table_id: u8,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Checklist {
    pub sync_byte: Check,
    pub duration: Check,
    pub loop_packet: Check,
    pub wrap_around: Check,
    pub splice_pes: Check,
    pub splice_clash: Check,
    pub onid_sequence: Check,
    pub missing_packets: Check,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub checklist: Checklist,
    pub sync_byte_errors: Vec<SyncByteError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_exhausted_at: Option<u64>,
    pub allowed_ad_duration: Vec<i64>,
    /// Splice PID -> spurious splice durations in seconds
    pub duration_errors: BTreeMap<u16, Vec<i64>>,
    pub loop_sections: Vec<LoopSection>,
    pub wraparounds: Vec<Wraparound>,
    /// Splice PID -> ordinals of messages that got no PES before the next one
    pub no_splice_hit: BTreeMap<u16, Vec<usize>>,
    pub onid_errors: BTreeMap<u16, Vec<OnidError>>,
    pub clashes: BTreeMap<u16, Vec<Clash>>,
    /// Track label -> PTS of missing packets
    pub missing_packets: BTreeMap<String, Vec<u64>>,
    pub section_errors: Vec<SectionError>,
    pub discarded_sections: u64,
}

/// Collects anomalies as the scan and reconciliation stages find them.
#[derive(Debug, Default)]
pub struct AnomalyReportBuilder {
    sync_byte_errors: Vec<SyncByteError>,
    sync_exhausted_at: Option<u64>,
    allowed_ad_duration: Vec<i64>,
    duration_errors: BTreeMap<u16, Vec<i64>>,
    loop_sections: Vec<LoopSection>,
    wraparounds: Vec<Wraparound>,
    no_splice_hit: BTreeMap<u16, Vec<usize>>,
    onid_errors: BTreeMap<u16, Vec<OnidError>>,
    clashes: BTreeMap<u16, Vec<Clash>>,
    missing_packets: BTreeMap<String, Vec<u64>>,
    section_errors: Vec<SectionError>,
    discarded_sections: u64,
}

impl AnomalyReportBuilder {
    pub fn new(allowed_ad_duration: Vec<i64>) -> Self {
        Self {
            allowed_ad_duration,
            ..Self::default()
        }
    }

    pub fn sync_recoveries(&mut self, recoveries: &[SyncRecovery], exhausted_at: Option<u64>) {
        self.sync_byte_errors
            .extend(recoveries.iter().map(SyncByteError::from));
        self.sync_exhausted_at = exhausted_at;
    }

    pub fn duration_error(&mut self, splice_pid: u16, seconds: i64) {
        self.duration_errors
            .entry(splice_pid)
            .or_default()
            .push(seconds);
    }

    /// Records a loop section once per `(splice_pid, video_pid)` pair.
    pub fn loop_section(&mut self, entry: LoopSection) -> bool {
        if self.loop_sections.contains(&entry) {
            return false;
        }
        self.loop_sections.push(entry);
        true
    }

    pub fn wraparound(&mut self, entry: Wraparound) {
        self.wraparounds.push(entry);
    }

    pub fn no_splice_hit(&mut self, splice_pid: u16, ordinal: usize) {
        self.no_splice_hit.entry(splice_pid).or_default().push(ordinal);
    }

    pub fn onid_errors(&mut self, splice_pid: u16, errors: Vec<OnidError>) {
        if !errors.is_empty() {
            self.onid_errors.insert(splice_pid, errors);
        }
    }

    pub fn clashes(&mut self, splice_pid: u16, clashes: Vec<Clash>) {
        if !clashes.is_empty() {
            self.clashes.insert(splice_pid, clashes);
        }
    }

    /// `missing` is empty when the track is continuous.
    pub fn missing_packets(&mut self, track: impl Into<String>, missing: Vec<u64>) {
        self.missing_packets.insert(track.into(), missing);
    }

    pub fn section_error(&mut self, pid: u16, table_id: u8, reason: impl Into<String>) {
        self.section_errors.push(SectionError {
            pid,
            table_id,
            reason: reason.into(),
        });
    }

    pub fn discarded_sections(&mut self, count: u64) {
        self.discarded_sections += count;
    }

    pub fn build(self) -> AnomalyReport {
        let checklist = Checklist {
            sync_byte: Check::passes(
                self.sync_byte_errors.is_empty() && self.sync_exhausted_at.is_none(),
            ),
            duration: Check::passes(self.duration_errors.is_empty()),
            loop_packet: Check::passes(self.loop_sections.is_empty()),
            wrap_around: Check::passes(self.wraparounds.is_empty()),
            splice_pes: Check::passes(self.no_splice_hit.is_empty()),
            splice_clash: Check::passes(self.clashes.is_empty()),
            onid_sequence: Check::passes(self.onid_errors.is_empty()),
            missing_packets: Check::passes(self.missing_packets.values().all(Vec::is_empty)),
        };
        AnomalyReport {
            checklist,
            sync_byte_errors: self.sync_byte_errors,
            sync_exhausted_at: self.sync_exhausted_at,
            allowed_ad_duration: self.allowed_ad_duration,
            duration_errors: self.duration_errors,
            loop_sections: self.loop_sections,
            wraparounds: self.wraparounds,
            no_splice_hit: self.no_splice_hit,
            onid_errors: self.onid_errors,
            clashes: self.clashes,
            missing_packets: self.missing_packets,
            section_errors: self.section_errors,
            discarded_sections: self.discarded_sections,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamEntry {
    pub stream_type: u8,
    pub pid: u16,
    pub descriptor_tags: Vec<u8>,
    /// Audio and video streams only, once a packet was seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scrambled: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramEntry {
    pub program_number: u16,
    pub pmt_pid: u16,
    pub pcr_pid: u16,
    pub version_number: u8,
    pub streams: Vec<StreamEntry>,
}

impl ProgramEntry {
    pub fn new(pmt_pid: u16, pmt: &Pmt, scrambled: &BTreeMap<u16, bool>) -> Self {
        Self {
            program_number: pmt.program_number,
            pmt_pid,
            pcr_pid: pmt.pcr_pid,
            version_number: pmt.version_number,
            streams: pmt
                .streams
                .iter()
                .map(|es| StreamEntry {
                    stream_type: es.stream_type,
                    pid: es.elementary_pid,
                    descriptor_tags: es.descriptor_tags(),
                    scrambled: scrambled.get(&es.elementary_pid).copied(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BindingEntry {
    pub splice_pid: u16,
    pub video_pid: Option<u16>,
    pub program_number: u16,
    /// Scrambling of the first packet seen on the video PID
    pub video_scrambled: Option<bool>,
}

impl BindingEntry {
    pub fn new(binding: &ScteBinding, video_scrambled: Option<bool>) -> Self {
        Self {
            splice_pid: binding.splice_pid,
            video_pid: binding.video_pid,
            program_number: binding.program_number,
            video_scrambled,
        }
    }
}

/// Everything known about one analysed file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub file: String,
    pub packets_read: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_pid: Option<u16>,
    pub program_map: Vec<ProgramEntry>,
    pub scte_bindings: Vec<BindingEntry>,
    /// Programs whose SCTE-35 binding chose one of several H.264 PIDs
    pub ambiguous_video_bindings: Vec<u16>,
    pub pid_occurrences: BTreeMap<u16, u64>,
    pub command_counts: SpliceCommandCounts,
    pub splice_events_by_pid: BTreeMap<u16, Vec<AnnotatedEvent>>,
    pub ad_spots_by_pid: BTreeMap<u16, Vec<AdSpot>>,
    pub spurious_spots: BTreeMap<u16, Vec<SpuriousEvent>>,
    pub stream_timeline: StreamTimeline,
    pub anomaly_report: AnomalyReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<MediaReport>,
    pub config_findings: Vec<ConfigFinding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_checklist() {
        let report = AnomalyReportBuilder::new(vec![30]).build();
        assert_eq!(report.checklist.sync_byte, Check::Ok);
        assert_eq!(report.checklist.missing_packets, Check::Ok);
        let json = serde_json::to_value(report.checklist).unwrap();
        assert_eq!(json["duration"], "OK");
    }

    #[test]
    fn test_failures_flip_checklist() {
        let mut builder = AnomalyReportBuilder::new(vec![30]);
        builder.duration_error(0x1F4, 12);
        builder.missing_packets("Video 1", vec![6000]);
        builder.missing_packets("Audio 1", vec![]);
        builder.no_splice_hit(0x1F4, 2);
        let report = builder.build();
        assert_eq!(report.checklist.duration, Check::Fail);
        assert_eq!(report.checklist.missing_packets, Check::Fail);
        assert_eq!(report.checklist.splice_pes, Check::Fail);
        assert_eq!(report.checklist.splice_clash, Check::Ok);
        assert_eq!(report.duration_errors[&0x1F4], vec![12]);
    }

    #[test]
    fn test_loop_section_recorded_once() {
        let mut builder = AnomalyReportBuilder::default();
        let entry = LoopSection {
            splice_pid: 0x1F4,
            video_pid: Some(0x100),
        };
        assert!(builder.loop_section(entry));
        assert!(!builder.loop_section(entry));
        assert_eq!(builder.build().loop_sections.len(), 1);
    }

    #[test]
    fn test_onid_error_serialization() {
        let json = serde_json::to_string(&OnidError::UnpairedOut { index: 2 }).unwrap();
        assert_eq!(json, r#"{"kind":"unpaired_out","index":2}"#);
    }
}
