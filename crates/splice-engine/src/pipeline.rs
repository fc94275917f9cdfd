//! Per-file analysis: two scan passes, reconciliation and media checks.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use ts::PacketReader;

use crate::config::ProjectConfig;
use crate::context::ParseContext;
use crate::media::{MediaInput, MediaReport, TrackInput, analyze_media};
use crate::probe::{
    ClockSource, MediaInfoSource, MediaProbe, StreamClock, stream_id_for_pid,
};
use crate::reconcile::{PidReconciliation, Reconciler, stream_timeline};
use crate::report::{AnalysisReport, BindingEntry, ProgramEntry};
use crate::scan::{scan_splices, scan_tables};
use crate::timeline::unwrap_sequence;
use crate::{Error, Result};

/// Frame PTS to picture type, per video PID.
type PictTypes = BTreeMap<u16, BTreeMap<u64, String>>;

/// Runs the analysis of one file at a time; cheap to clone and share
/// between worker tasks.
#[derive(Clone)]
pub struct Analyzer {
    config: Arc<ProjectConfig>,
    probe: Option<Arc<dyn MediaProbe>>,
    media_info: Option<Arc<dyn MediaInfoSource>>,
    clock: Option<Arc<dyn ClockSource>>,
}

impl Analyzer {
    pub fn new(config: Arc<ProjectConfig>) -> Self {
        Self {
            config,
            probe: None,
            media_info: None,
            clock: None,
        }
    }

    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_media_info(mut self, media_info: Arc<dyn MediaInfoSource>) -> Self {
        self.media_info = Some(media_info);
        self
    }

    /// Use an external clock instead of the in-stream TDT/TOT.
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Analyse a capture from any seekable source, without collaborators.
    pub fn analyze_stream<R: Read + Seek>(&self, name: &str, source: R) -> Result<AnalysisReport> {
        let ctx = self.scan(name, source)?;
        let clock = ctx.stream_clock();
        Ok(self.assemble(name, ctx, clock, &PictTypes::new(), None))
    }

    /// Analyse a file, consulting every configured collaborator.
    ///
    /// A collaborator failure fails the whole file.
    #[instrument(skip(self), level = "debug")]
    pub fn analyze_path(&self, path: &Path) -> Result<AnalysisReport> {
        let name = path.display().to_string();
        let file = File::open(path)?;
        let ctx = self.scan(&name, file)?;

        let clock = match &self.clock {
            Some(source) => source.stream_clock(path)?,
            None => ctx.stream_clock(),
        };
        if clock.first_utc.is_none() {
            warn!(file = %name, "No absolute time reference, UTC fields left empty");
        }

        let pict_types = match &self.probe {
            Some(probe) => self.pict_types(probe.as_ref(), path, &ctx)?,
            None => PictTypes::new(),
        };
        let media = match (&self.probe, &self.media_info) {
            (Some(probe), Some(media_info)) => {
                Some(self.media(probe.as_ref(), media_info.as_ref(), path)?)
            }
            _ => None,
        };
        Ok(self.assemble(&name, ctx, clock, &pict_types, media))
    }

    fn scan<R: Read + Seek>(&self, name: &str, mut source: R) -> Result<ParseContext> {
        let mut ctx = ParseContext::new(self.config.allowed_ad_duration.clone());

        let mut reader = PacketReader::new(&mut source)?;
        scan_tables(&mut reader, &self.config, &mut ctx)?;
        if ctx.packets_read == 0 {
            return Err(Error::stream_unreadable(name));
        }
        drop(reader);

        source.seek(SeekFrom::Start(0))?;
        let mut reader = PacketReader::new(&mut source)?;
        scan_splices(&mut reader, &self.config, &mut ctx)?;
        Ok(ctx)
    }

    fn pict_types(&self, probe: &dyn MediaProbe, path: &Path, ctx: &ParseContext) -> Result<PictTypes> {
        let mut types = PictTypes::new();
        let mut video_pids: Vec<u16> = ctx.bindings.iter().filter_map(|b| b.video_pid).collect();
        video_pids.sort_unstable();
        video_pids.dedup();
        for pid in video_pids {
            let frames = probe.frames(path, &stream_id_for_pid(pid))?;
            let typed: Vec<(u64, String)> = frames
                .into_iter()
                .filter_map(|f| Some((f.pts?, f.pict_type?)))
                .collect();
            let full = unwrap_sequence(typed.iter().map(|(pts, _)| *pts));
            types.insert(
                pid,
                full.into_iter()
                    .zip(typed.into_iter().map(|(_, t)| t))
                    .collect(),
            );
        }
        Ok(types)
    }

    fn media(
        &self,
        probe: &dyn MediaProbe,
        media_info: &dyn MediaInfoSource,
        path: &Path,
    ) -> Result<MediaReport> {
        let mut input = MediaInput {
            info: media_info.media_info(path)?,
            interleaved: probe.interleaved_packets(path)?,
            ..MediaInput::default()
        };
        for stream in probe.streams(path)? {
            let packets = probe.packets(path, &stream.id)?;
            let frames = probe.frames(path, &stream.id)?;
            debug!(stream = %stream.id, packets = packets.len(), frames = frames.len(), "Probed stream");
            input.tracks.push(TrackInput {
                stream,
                packets,
                frames,
            });
        }
        Ok(analyze_media(&input, &self.config))
    }

    fn assemble(
        &self,
        name: &str,
        mut ctx: ParseContext,
        clock: StreamClock,
        pict_types: &PictTypes,
        media: Option<MediaReport>,
    ) -> AnalysisReport {
        let reconciler = Reconciler::new(&self.config, clock.first_utc);
        let mut reconciled: BTreeMap<u16, PidReconciliation> = BTreeMap::new();
        for (&pid, events) in &ctx.events {
            let types = ctx
                .binding(pid)
                .and_then(|b| b.video_pid)
                .and_then(|video| pict_types.get(&video));
            let result = reconciler.reconcile(pid, events, types);
            for &seconds in &result.duration_errors {
                ctx.anomalies.duration_error(pid, seconds);
            }
            ctx.anomalies.clashes(pid, result.clashes.clone());
            ctx.anomalies.onid_errors(pid, result.onid_errors.clone());
            reconciled.insert(pid, result);
        }

        if let Some(media) = &media {
            for (track, missing) in media.missing_packets() {
                ctx.anomalies.missing_packets(track, missing);
            }
        }

        let timeline = stream_timeline(&reconciled, clock.first_utc, clock.last_utc);
        let spots: usize = reconciled.values().map(|r| r.spots.len()).sum();
        info!(
            file = name,
            splice_pids = reconciled.len(),
            spots,
            "Analysis complete"
        );

        let program_map = ctx
            .pmts
            .iter()
            .map(|(pmt_pid, pmt)| ProgramEntry::new(*pmt_pid, pmt, &ctx.scrambled))
            .collect();
        let scte_bindings = ctx
            .bindings
            .iter()
            .map(|b| {
                let scrambled = b.video_pid.and_then(|v| ctx.scrambled.get(&v).copied());
                BindingEntry::new(b, scrambled)
            })
            .collect();

        let mut splice_events_by_pid = BTreeMap::new();
        let mut ad_spots_by_pid = BTreeMap::new();
        let mut spurious_spots = BTreeMap::new();
        for (pid, result) in reconciled {
            splice_events_by_pid.insert(pid, result.events);
            ad_spots_by_pid.insert(pid, result.spots);
            if !result.spurious.is_empty() {
                spurious_spots.insert(pid, result.spurious);
            }
        }

        AnalysisReport {
            file: name.to_string(),
            packets_read: ctx.packets_read,
            network_pid: ctx.pat.as_ref().and_then(|p| p.network_pid),
            program_map,
            scte_bindings,
            ambiguous_video_bindings: ctx.ambiguous_video_bindings,
            pid_occurrences: ctx.pid_occurrences,
            command_counts: ctx.command_counts,
            splice_events_by_pid,
            ad_spots_by_pid,
            spurious_spots,
            stream_timeline: timeline,
            anomaly_report: ctx.anomalies.build(),
            media,
            config_findings: self.config.findings.clone(),
        }
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("probe", &self.probe.is_some())
            .field("media_info", &self.media_info.is_some())
            .field("clock", &self.clock.is_some())
            .finish_non_exhaustive()
    }
}
