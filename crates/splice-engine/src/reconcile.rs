//! Pairing of splice-out and splice-in events into ad spots.
//!
//! Events of one splice PID are paired by a restart-from-the-beginning
//! reducer: the first remaining splice-out is matched against the
//! splice-ins after it, and after every match the scan starts over.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::config::ProjectConfig;
use crate::event::SpliceEvent;
use crate::report::{Clash, OnidError};
use crate::timeline::{
    PTS_CLOCK_HZ, PTS_MASK, delta_seconds, format_secs_ms, format_utc, offset_ms, pts_to_utc,
    round2, ticks_to_seconds,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Paired,
    Spurious,
    Cancelled,
    /// Splice at the next opportunity; reported, never paired
    Immediate,
    /// Never placed on the video timeline
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SpuriousReason {
    /// A splice-in with no splice-out before it
    LeadingSpliceIn,
    /// A splice-in whose distance from the splice-out is not an allowed duration
    DurationMismatch { seconds: i64 },
    /// Left over once pairing ran out of candidates
    Unmatched,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpotType {
    Single,
    B2B,
}

/// A splice event with the values derived during reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnnotatedEvent {
    #[serde(flatten)]
    pub event: SpliceEvent,
    pub status: EventStatus,
    pub start_pts: Option<u64>,
    pub end_pts: Option<u64>,
    /// Seconds since the previous eligible event, two decimals
    pub spot2spot_diff: Option<f64>,
    /// Milliseconds from the first I-frame of the video PID
    pub offset_ms: Option<i64>,
    pub from_stream_start: Option<String>,
    /// Seconds from the splice hit to the splice time
    pub hit_to_start_seconds: Option<f64>,
    pub start_utc: Option<String>,
    pub splice_hit_utc: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpuriousEvent {
    pub ordinal: usize,
    pub event_id: u32,
    pub onid: u8,
    pub start_pts: u64,
    #[serde(flatten)]
    pub reason: SpuriousReason,
}

/// A reconciled splice-out/splice-in pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdSpot {
    pub out_ordinal: usize,
    pub in_ordinal: usize,
    pub out_event_id: u32,
    pub in_event_id: u32,
    pub start_pts: u64,
    pub in_pts: u64,
    pub end_pts: u64,
    /// Whole seconds between splice-out and splice-in
    pub duration_seconds: i64,
    /// break_duration of the splice-out, when signalled
    pub declared_duration_seconds: Option<f64>,
    /// Live content before this spot, whole seconds
    pub live_before_seconds: i64,
    pub spot_type: SpotType,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pict_type: Option<String>,
    pub start_utc: Option<String>,
    pub end_utc: Option<String>,
}

/// UTC renderings of the run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamTimeline {
    pub stream_start_utc: Option<String>,
    pub stream_end_utc: Option<String>,
    pub splice_hit_utc: Vec<String>,
    pub spot_utc: Vec<String>,
}

/// Input of the pairing reducer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Caller's index of the event
    pub index: usize,
    pub onid: u8,
    /// Milliseconds on the PID's timeline
    pub ms: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pairing {
    /// `(splice_out, splice_in)` candidate indices in match order
    pub pairs: Vec<(usize, usize)>,
    pub spurious: Vec<(usize, SpuriousReason)>,
    /// Spurious durations in seconds, in detection order
    pub duration_errors: Vec<i64>,
}

/// Pair splice-outs with splice-ins whose distance is an allowed duration.
pub fn pair_events(candidates: &[Candidate], allowed: impl Fn(i64) -> bool) -> Pairing {
    let mut result = Pairing::default();
    let mut working = candidates.to_vec();
    let mut i = 0;
    while i < working.len() {
        let out = working[i];
        if out.onid == 0 {
            result.spurious.push((out.index, SpuriousReason::LeadingSpliceIn));
            working.remove(i);
            i = 0;
            continue;
        }

        let mut matched = false;
        let mut j = i + 1;
        while j < working.len() {
            let back_in = working[j];
            if back_in.onid != 0 {
                j += 1;
                continue;
            }
            let seconds = delta_seconds(out.ms, back_in.ms);
            if allowed(seconds) {
                result.pairs.push((out.index, back_in.index));
                working.remove(j);
                working.remove(i);
                matched = true;
                break;
            }
            result
                .spurious
                .push((back_in.index, SpuriousReason::DurationMismatch { seconds }));
            result.duration_errors.push(seconds);
            working.remove(j);
        }

        if matched {
            i = 0;
        } else {
            i += 1;
        }
    }
    result.spurious.extend(
        working
            .into_iter()
            .map(|left| (left.index, SpuriousReason::Unmatched)),
    );
    result
}

/// Every splice-out must be immediately followed by a splice-in.
pub fn onid_errors(onids: &[u8]) -> Vec<OnidError> {
    if onids.is_empty() {
        return vec![OnidError::NoEligibleEvents];
    }
    if onids.iter().all(|&o| o == 1) {
        return vec![OnidError::AllOutOfNetwork];
    }
    if onids.iter().all(|&o| o == 0) {
        return vec![OnidError::AllReturnToNetwork];
    }
    onids
        .iter()
        .enumerate()
        .filter(|&(i, &onid)| onid == 1 && onids.get(i + 1) != Some(&0))
        .map(|(index, _)| OnidError::UnpairedOut { index })
        .collect()
}

/// Flag spots that start before the previous spot ended. Clashing spots are
/// marked invalid.
pub fn detect_clashes(spots: &mut [AdSpot]) -> Vec<Clash> {
    let mut clashes = Vec::new();
    for i in 1..spots.len() {
        let (previous, current) = (&spots[i - 1], &spots[i]);
        if current.start_pts < previous.end_pts {
            clashes.push(Clash {
                previous_ordinal: previous.out_ordinal,
                ordinal: current.out_ordinal,
                start_pts: current.start_pts,
                previous_end_pts: previous.end_pts,
            });
            spots[i].valid = false;
        }
    }
    clashes
}

/// Reconciliation output for one splice PID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PidReconciliation {
    pub events: Vec<AnnotatedEvent>,
    pub spots: Vec<AdSpot>,
    pub spurious: Vec<SpuriousEvent>,
    pub duration_errors: Vec<i64>,
    pub clashes: Vec<Clash>,
    pub onid_errors: Vec<OnidError>,
}

/// Stream-level inputs shared by every splice PID.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    config: &'a ProjectConfig,
    epoch: Option<DateTime<Utc>>,
}

impl<'a> Reconciler<'a> {
    /// `epoch` is the UTC of the first I-frame; without it no UTC is rendered.
    pub fn new(config: &'a ProjectConfig, epoch: Option<DateTime<Utc>>) -> Self {
        Self { config, epoch }
    }

    fn utc(&self, pts: u64, origin: u64) -> Option<String> {
        self.epoch.map(|epoch| format_utc(pts_to_utc(epoch, pts, origin)))
    }

    /// Reconcile the events of one splice PID, in arrival order.
    ///
    /// `pict_types` maps frame PTS to picture type on the bound video PID.
    pub fn reconcile(
        &self,
        splice_pid: u16,
        events: &[SpliceEvent],
        pict_types: Option<&BTreeMap<u64, String>>,
    ) -> PidReconciliation {
        let starts: Vec<Option<u64>> = events.iter().map(SpliceEvent::start_pts).collect();
        let origin = events
            .iter()
            .filter_map(|e| e.first_pes_pts)
            .min()
            .or_else(|| starts.iter().flatten().copied().min())
            .unwrap_or(0);

        let mut annotated: Vec<AnnotatedEvent> = events
            .iter()
            .zip(&starts)
            .map(|(event, start)| self.annotate(event, *start, origin))
            .collect();

        let eligible: Vec<usize> = (0..events.len())
            .filter(|&i| !events[i].cancel && !events[i].immediate && starts[i].is_some())
            .collect();

        let mut previous: Option<u64> = None;
        for &i in &eligible {
            let start = starts[i].unwrap_or(0);
            let diff = previous.map_or(0.0, |p| {
                round2(round2(ticks_to_seconds(start as i64)) - round2(ticks_to_seconds(p as i64)))
            });
            annotated[i].spot2spot_diff = Some(diff);
            previous = Some(start);
        }

        let candidates: Vec<Candidate> = eligible
            .iter()
            .map(|&i| Candidate {
                index: i,
                onid: events[i].onid(),
                ms: annotated[i].offset_ms.unwrap_or(0),
            })
            .collect();
        let pairing = pair_events(&candidates, |s| self.config.is_allowed_duration(s));

        let mut spots: Vec<AdSpot> = pairing
            .pairs
            .iter()
            .map(|&(out, back_in)| self.spot(&annotated[out], &annotated[back_in], origin, pict_types))
            .collect();
        spots.sort_by_key(|s| s.out_ordinal);
        Self::classify(&mut spots, &annotated);
        let clashes = detect_clashes(&mut spots);

        for &(out, back_in) in &pairing.pairs {
            annotated[out].status = EventStatus::Paired;
            annotated[back_in].status = EventStatus::Paired;
            if let Some(spot) = spots.iter().find(|s| s.out_ordinal == events[out].ordinal) {
                annotated[out].end_pts = Some(spot.end_pts);
            }
        }
        let mut spurious: Vec<SpuriousEvent> = pairing
            .spurious
            .iter()
            .map(|&(i, reason)| {
                annotated[i].status = EventStatus::Spurious;
                SpuriousEvent {
                    ordinal: events[i].ordinal,
                    event_id: events[i].event_id,
                    onid: events[i].onid(),
                    start_pts: starts[i].unwrap_or(0),
                    reason,
                }
            })
            .collect();
        spurious.sort_by_key(|s| s.ordinal);

        let onids: Vec<u8> = eligible.iter().map(|&i| events[i].onid()).collect();
        let onid_errors = onid_errors(&onids);

        debug!(
            splice_pid = %format_args!("0x{:04x}", splice_pid),
            events = events.len(),
            spots = spots.len(),
            spurious = spurious.len(),
            clashes = clashes.len(),
            "Reconciled splice PID"
        );

        PidReconciliation {
            events: annotated,
            spots,
            spurious,
            duration_errors: pairing.duration_errors,
            clashes,
            onid_errors,
        }
    }

    fn annotate(&self, event: &SpliceEvent, start: Option<u64>, origin: u64) -> AnnotatedEvent {
        let status = if event.cancel {
            EventStatus::Cancelled
        } else if event.immediate {
            EventStatus::Immediate
        } else if start.is_none() {
            EventStatus::Unresolved
        } else {
            // Settled by the pairing below
            EventStatus::Spurious
        };
        let offset = start.map(|s| offset_ms(s, origin));
        AnnotatedEvent {
            event: event.clone(),
            status,
            start_pts: start,
            end_pts: start.zip(event.duration_ticks).map(|(s, d)| s + d),
            spot2spot_diff: None,
            offset_ms: offset,
            from_stream_start: offset.map(|ms| format_secs_ms(ms as f64 / 1000.0)),
            hit_to_start_seconds: start
                .zip(event.splice_hit_pts)
                .map(|(s, hit)| round2(ticks_to_seconds(s as i64 - hit as i64))),
            start_utc: start.and_then(|s| self.utc(s, origin)),
            splice_hit_utc: event.splice_hit_pts.and_then(|hit| self.utc(hit, origin)),
        }
    }

    fn spot(
        &self,
        out: &AnnotatedEvent,
        back_in: &AnnotatedEvent,
        origin: u64,
        pict_types: Option<&BTreeMap<u64, String>>,
    ) -> AdSpot {
        let start_pts = out.start_pts.unwrap_or(0);
        let in_pts = back_in.start_pts.unwrap_or(0);
        let duration_seconds =
            delta_seconds(out.offset_ms.unwrap_or(0), back_in.offset_ms.unwrap_or(0));
        let end_pts = match out.event.duration_ticks {
            Some(ticks) => start_pts + ticks,
            None => start_pts.saturating_add_signed(duration_seconds * PTS_CLOCK_HZ as i64),
        };
        let pict_type = pict_types.and_then(|types| {
            types
                .get(&start_pts)
                .or_else(|| types.get(&(start_pts & PTS_MASK)))
                .cloned()
        });
        AdSpot {
            out_ordinal: out.event.ordinal,
            in_ordinal: back_in.event.ordinal,
            out_event_id: out.event.event_id,
            in_event_id: back_in.event.event_id,
            start_pts,
            in_pts,
            end_pts,
            duration_seconds,
            declared_duration_seconds: out
                .event
                .duration_ticks
                .map(|d| round2(ticks_to_seconds(d as i64))),
            live_before_seconds: 0,
            spot_type: SpotType::Single,
            valid: true,
            pict_type,
            start_utc: self.utc(start_pts, origin),
            end_utc: self.utc(end_pts, origin),
        }
    }

    /// Live time before each spot and back-to-back classification.
    fn classify(spots: &mut [AdSpot], annotated: &[AnnotatedEvent]) {
        let ms_of = |ordinal: usize| {
            annotated
                .iter()
                .find(|a| a.event.ordinal == ordinal)
                .and_then(|a| a.offset_ms)
                .unwrap_or_default()
        };
        for i in 0..spots.len() {
            let out_ms = ms_of(spots[i].out_ordinal);
            if i == 0 {
                spots[i].live_before_seconds = delta_seconds(0, out_ms);
                continue;
            }
            let previous_in_ms = ms_of(spots[i - 1].in_ordinal);
            spots[i].live_before_seconds = delta_seconds(previous_in_ms, out_ms);
            if spots[i].start_pts <= spots[i - 1].in_pts {
                spots[i].spot_type = SpotType::B2B;
            }
        }
    }
}

/// Timeline lists for the report, in splice PID order.
pub fn stream_timeline(
    reconciled: &BTreeMap<u16, PidReconciliation>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> StreamTimeline {
    let mut timeline = StreamTimeline {
        stream_start_utc: start.map(format_utc),
        stream_end_utc: end.map(format_utc),
        ..StreamTimeline::default()
    };
    for pid in reconciled.values() {
        for event in pid.events.iter().filter(|e| e.status == EventStatus::Paired) {
            if let Some(hit) = &event.splice_hit_utc {
                timeline.splice_hit_utc.push(hit.clone());
            }
            if let Some(start) = &event.start_utc {
                timeline.spot_utc.push(start.clone());
            }
        }
    }
    timeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    fn event(ordinal: usize, onid: u8, seconds: u64) -> SpliceEvent {
        let pts = seconds * PTS_CLOCK_HZ;
        SpliceEvent {
            ordinal,
            event_id: ordinal as u32,
            splice_pid: 0x1F4,
            video_pid: Some(0x100),
            cancel: false,
            immediate: false,
            out_of_network: onid == 1,
            pts_time: Some(pts),
            pts_adjustment: 0,
            duration_ticks: None,
            auto_return: false,
            unique_program_id: 0,
            avail_num: 0,
            avails_expected: 0,
            descriptor: None,
            first_pes_pts: Some(0),
            splice_hit_pts: Some(pts.saturating_sub(45_000)),
        }
    }

    fn candidates(items: &[(u8, i64)]) -> Vec<Candidate> {
        items
            .iter()
            .enumerate()
            .map(|(index, &(onid, seconds))| Candidate {
                index,
                onid,
                ms: seconds * 1000,
            })
            .collect()
    }

    fn allowed(seconds: i64) -> bool {
        [10, 15, 20, 30, 45, 60].contains(&seconds)
    }

    #[test]
    fn test_pairing_accepts_allowed_and_rejects_short_break() {
        let pairing = pair_events(&candidates(&[(1, 100), (0, 130), (1, 200), (0, 212)]), allowed);
        assert_eq!(pairing.pairs, vec![(0, 1)]);
        assert_eq!(pairing.duration_errors, vec![12]);
        assert_eq!(
            pairing.spurious,
            vec![
                (3, SpuriousReason::DurationMismatch { seconds: 12 }),
                (2, SpuriousReason::Unmatched),
            ]
        );
    }

    #[test]
    fn test_pairing_leading_splice_in() {
        let pairing = pair_events(&candidates(&[(0, 5), (1, 10), (0, 40)]), allowed);
        assert_eq!(pairing.pairs, vec![(1, 2)]);
        assert_eq!(pairing.spurious, vec![(0, SpuriousReason::LeadingSpliceIn)]);
    }

    #[test]
    fn test_pairing_skips_over_splice_outs() {
        // The first splice-out claims the splice-in after a second splice-out
        let pairing = pair_events(&candidates(&[(1, 100), (1, 110), (0, 130)]), allowed);
        assert_eq!(pairing.pairs, vec![(0, 2)]);
        assert_eq!(pairing.spurious, vec![(1, SpuriousReason::Unmatched)]);
    }

    #[test]
    fn test_pairing_truncates_delta() {
        let items = [
            Candidate { index: 0, onid: 1, ms: 1_000 },
            Candidate { index: 1, onid: 0, ms: 31_999 },
        ];
        assert_eq!(pair_events(&items, allowed).pairs, vec![(0, 1)]);
    }

    #[rstest]
    #[case(&[1, 0, 1, 1, 0], vec![OnidError::UnpairedOut { index: 2 }])]
    #[case(&[1, 0, 1, 0], vec![])]
    #[case(&[1, 0, 1], vec![OnidError::UnpairedOut { index: 2 }])]
    #[case(&[0, 1, 1, 0], vec![OnidError::UnpairedOut { index: 1 }])]
    #[case(&[1, 1], vec![OnidError::AllOutOfNetwork])]
    #[case(&[0], vec![OnidError::AllReturnToNetwork])]
    #[case(&[], vec![OnidError::NoEligibleEvents])]
    fn test_onid_sequence(#[case] onids: &[u8], #[case] expected: Vec<OnidError>) {
        assert_eq!(onid_errors(onids), expected);
    }

    #[test]
    fn test_reconcile_spots_and_spurious() {
        let config = ProjectConfig::default();
        let events = vec![event(1, 1, 100), event(2, 0, 130), event(3, 1, 200), event(4, 0, 212)];
        let result = Reconciler::new(&config, None).reconcile(0x1F4, &events, None);

        assert_eq!(result.spots.len(), 1);
        let spot = &result.spots[0];
        assert_eq!(spot.duration_seconds, 30);
        assert_eq!(spot.end_pts, 130 * PTS_CLOCK_HZ);
        assert_eq!(spot.live_before_seconds, 100);
        assert_eq!(spot.spot_type, SpotType::Single);
        assert!(spot.start_utc.is_none());

        assert_eq!(result.duration_errors, vec![12]);
        assert_eq!(result.spurious.len(), 2);
        assert_eq!(result.spurious[0].ordinal, 3);
        assert_eq!(result.events[0].status, EventStatus::Paired);
        assert_eq!(result.events[3].status, EventStatus::Spurious);
        assert_eq!(result.events[2].spot2spot_diff, Some(70.0));
        assert!(result.onid_errors.is_empty());
    }

    #[test]
    fn test_cancelled_event_excluded() {
        let config = ProjectConfig::default();
        let mut cancelled = event(2, 1, 110);
        cancelled.cancel = true;
        let events = vec![event(1, 1, 100), cancelled, event(3, 0, 130)];
        let result = Reconciler::new(&config, None).reconcile(0x1F4, &events, None);
        assert_eq!(result.events[1].status, EventStatus::Cancelled);
        assert_eq!(result.events[1].spot2spot_diff, None);
        assert_eq!(result.spots.len(), 1);
        assert_eq!(result.spots[0].in_ordinal, 3);
    }

    #[test]
    fn test_declared_duration_clash() {
        let config = ProjectConfig::default();
        let mut first = event(1, 1, 100);
        // Declared 60 s break overruns the next splice-out at 140 s
        first.duration_ticks = Some(60 * PTS_CLOCK_HZ);
        let events = vec![first, event(2, 0, 130), event(3, 1, 140), event(4, 0, 170)];
        let result = Reconciler::new(&config, None).reconcile(0x1F4, &events, None);

        assert_eq!(result.spots.len(), 2);
        assert_eq!(
            result.clashes,
            vec![Clash {
                previous_ordinal: 1,
                ordinal: 3,
                start_pts: 140 * PTS_CLOCK_HZ,
                previous_end_pts: 160 * PTS_CLOCK_HZ,
            }]
        );
        assert!(result.spots[0].valid);
        assert!(!result.spots[1].valid);
        assert_eq!(result.spots[1].live_before_seconds, 10);
        assert_eq!(result.spots[0].declared_duration_seconds, Some(60.0));
    }

    #[test]
    fn test_back_to_back_spots() {
        let config = ProjectConfig::default();
        let events = vec![event(1, 1, 100), event(2, 0, 130), event(3, 1, 130), event(4, 0, 160)];
        let result = Reconciler::new(&config, None).reconcile(0x1F4, &events, None);
        assert_eq!(result.spots.len(), 2);
        assert_eq!(result.spots[1].spot_type, SpotType::B2B);
        assert!(result.clashes.is_empty());
    }

    #[test]
    fn test_utc_and_pict_type() {
        let config = ProjectConfig::default();
        let epoch = Utc.with_ymd_and_hms(2024, 8, 2, 8, 49, 38).unwrap();
        let events = vec![event(1, 1, 62), event(2, 0, 92)];
        let types = BTreeMap::from([(62 * PTS_CLOCK_HZ, "I".to_string())]);
        let result = Reconciler::new(&config, Some(epoch)).reconcile(0x1F4, &events, Some(&types));
        let spot = &result.spots[0];
        assert_eq!(spot.start_utc.as_deref(), Some("2024-08-02 08:50:40.000"));
        assert_eq!(spot.end_utc.as_deref(), Some("2024-08-02 08:51:10.000"));
        assert_eq!(spot.pict_type.as_deref(), Some("I"));
        assert_eq!(
            result.events[0].splice_hit_utc.as_deref(),
            Some("2024-08-02 08:50:39.500")
        );

        let reconciled = BTreeMap::from([(0x1F4, result)]);
        let timeline = stream_timeline(&reconciled, Some(epoch), None);
        assert_eq!(timeline.spot_utc.len(), 2);
        assert_eq!(timeline.stream_start_utc.as_deref(), Some("2024-08-02 08:49:38.000"));
    }

    #[test]
    fn test_unresolved_event() {
        let config = ProjectConfig::default();
        let mut unhit = event(1, 1, 100);
        unhit.splice_hit_pts = None;
        unhit.first_pes_pts = None;
        let result = Reconciler::new(&config, None).reconcile(0x1F4, &[unhit], None);
        assert_eq!(result.events[0].status, EventStatus::Unresolved);
        assert_eq!(result.events[0].start_pts, None);
        assert_eq!(result.onid_errors, vec![OnidError::NoEligibleEvents]);
    }

    #[test]
    fn test_immediate_splice_not_paired() {
        let config = ProjectConfig::default();
        let mut immediate = event(1, 1, 100);
        immediate.immediate = true;
        immediate.pts_time = None;
        let events = vec![immediate, event(2, 0, 130)];
        let result = Reconciler::new(&config, None).reconcile(0x1F4, &events, None);

        assert!(result.spots.is_empty());
        assert_eq!(result.events[0].status, EventStatus::Immediate);
        assert_eq!(result.events[0].spot2spot_diff, None);
        assert_eq!(result.events[1].status, EventStatus::Spurious);
        assert_eq!(result.spurious.len(), 1);
        assert_eq!(result.spurious[0].ordinal, 2);
        assert_eq!(result.spurious[0].reason, SpuriousReason::LeadingSpliceIn);
        assert_eq!(result.onid_errors, vec![OnidError::AllReturnToNetwork]);
    }
}
