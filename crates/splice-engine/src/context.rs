use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use ts::{Pat, Pmt, ScteBinding, bind_scte35};

use crate::event::{SpliceCommandCounts, SpliceEvent};
use crate::probe::StreamClock;
use crate::report::AnomalyReportBuilder;

/// Mutable state threaded through the scan passes of one file.
#[derive(Debug)]
pub struct ParseContext {
    /// First PAT of the stream
    pub pat: Option<Pat>,
    /// Accepted PMT sections with the PID they arrived on, in arrival order
    pub pmts: Vec<(u16, Pmt)>,
    pub bindings: Vec<ScteBinding>,
    pub ambiguous_video_bindings: Vec<u16>,
    pub first_stream_time: Option<DateTime<Utc>>,
    pub last_stream_time: Option<DateTime<Utc>>,
    pub packets_read: u64,
    pub pid_occurrences: BTreeMap<u16, u64>,
    pub command_counts: SpliceCommandCounts,
    /// Splice PID -> splice_insert events in arrival order
    pub events: BTreeMap<u16, Vec<SpliceEvent>>,
    /// Audio and video PIDs announced by any PMT
    pub media_pids: BTreeSet<u16>,
    /// Audio/video PID -> scrambling of its first packet
    pub scrambled: BTreeMap<u16, bool>,
    /// Video PID -> full PTS of its first I-frame
    pub first_iframe_pts: BTreeMap<u16, u64>,
    pub anomalies: AnomalyReportBuilder,
}

impl ParseContext {
    pub fn new(allowed_ad_duration: Vec<i64>) -> Self {
        Self {
            pat: None,
            pmts: Vec::new(),
            bindings: Vec::new(),
            ambiguous_video_bindings: Vec::new(),
            first_stream_time: None,
            last_stream_time: None,
            packets_read: 0,
            pid_occurrences: BTreeMap::new(),
            command_counts: SpliceCommandCounts::default(),
            events: BTreeMap::new(),
            media_pids: BTreeSet::new(),
            scrambled: BTreeMap::new(),
            first_iframe_pts: BTreeMap::new(),
            anomalies: AnomalyReportBuilder::new(allowed_ad_duration),
        }
    }

    /// Derive SCTE-35 bindings from the PMTs collected so far.
    pub fn derive_bindings(&mut self) {
        self.bindings = bind_scte35(self.pmts.iter().map(|(_, pmt)| pmt));
        let mut ambiguous: Vec<u16> = self
            .pmts
            .iter()
            .filter(|(_, pmt)| pmt.video_pids().count() > 1)
            .map(|(_, pmt)| pmt.program_number)
            .filter(|program| self.bindings.iter().any(|b| b.program_number == *program))
            .collect();
        ambiguous.sort_unstable();
        ambiguous.dedup();
        self.ambiguous_video_bindings = ambiguous;
        self.media_pids = self
            .pmts
            .iter()
            .flat_map(|(_, pmt)| pmt.streams.iter())
            .filter(|es| es.is_media())
            .map(|es| es.elementary_pid)
            .collect();
    }

    pub fn binding(&self, splice_pid: u16) -> Option<&ScteBinding> {
        self.bindings.iter().find(|b| b.splice_pid == splice_pid)
    }

    pub fn is_splice_pid(&self, pid: u16) -> bool {
        self.binding(pid).is_some()
    }

    pub fn is_video_pid(&self, pid: u16) -> bool {
        self.bindings.iter().any(|b| b.video_pid == Some(pid))
    }

    /// Splice PIDs cueing `video_pid`.
    pub fn splice_pids_for(&self, video_pid: u16) -> impl Iterator<Item = u16> + '_ {
        self.bindings
            .iter()
            .filter(move |b| b.video_pid == Some(video_pid))
            .map(|b| b.splice_pid)
    }

    pub fn record_stream_time(&mut self, utc: DateTime<Utc>) {
        self.first_stream_time.get_or_insert(utc);
        self.last_stream_time = Some(utc);
    }

    /// Clock from the in-stream TDT/TOT.
    pub fn stream_clock(&self) -> StreamClock {
        StreamClock {
            first_utc: self.first_stream_time,
            last_utc: self.last_stream_time,
        }
    }
}
