//! Per-track timing analysis over probe records.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::probe::{CodecType, FrameRecord, InterleavedPacket, PacketRecord, StreamDescriptor};
use crate::timeline::{format_secs_abs_ms, format_secs_ms, unwrap_sequence};

pub const VARIABLE_FRAME_DURATION: &str = "Variable Frame Duration Detected";
pub const OK: &str = "Ok";
pub const NOT_OK: &str = "Not Ok";

/// Maximum audio/video interleave delay before a remark is raised.
const INTERLEAVE_LIMIT_MS: i64 = 50;
const AUDIO_FRAME_SIZE_LIMIT_KB: f64 = 200.0;
const VIDEO_FRAME_SIZE_LIMIT_KB: f64 = 1024.0;
const AVERAGE_BITRATE_MBPS: std::ops::RangeInclusive<f64> = 2.8..=3.0;

static HOURS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*h").unwrap());
static MINUTES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*min").unwrap());
static SECONDS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*s").unwrap());
static MILLIS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)\s*ms").unwrap());

/// Milliseconds of a rendered duration such as `"1s 250ms"` or `"30 s 32 ms"`.
///
/// Only digit runs are read, so a leading sign is ignored.
pub fn to_ms(value: &str) -> i64 {
    let capture = |re: &Regex| {
        re.captures(value)
            .and_then(|c| c[1].parse::<i64>().ok())
            .unwrap_or(0)
    };
    capture(&HOURS) * 3_600_000 + capture(&MINUTES) * 60_000 + capture(&SECONDS) * 1000 + capture(&MILLIS)
}

/// Probe records of one elementary stream.
#[derive(Debug, Clone)]
pub struct TrackInput {
    pub stream: StreamDescriptor,
    pub packets: Vec<PacketRecord>,
    pub frames: Vec<FrameRecord>,
}

/// Windowed statistic with the time of its extremes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extremes {
    pub max: String,
    pub max_at: String,
    pub min: String,
    pub min_at: String,
    pub average: String,
}

impl Extremes {
    fn from_samples(samples: &[(f64, f64)], unit: &str) -> Option<Self> {
        let (first, rest) = samples.split_first()?;
        let mut max = *first;
        let mut min = *first;
        // Strict comparisons keep the first occurrence of each extreme.
        for sample in rest {
            if sample.1 > max.1 {
                max = *sample;
            }
            if sample.1 < min.1 {
                min = *sample;
            }
        }
        let average = samples.iter().map(|s| s.1).sum::<f64>() / samples.len() as f64;
        Some(Self {
            max: format!("{:.3} {unit}", max.1),
            max_at: format!("{:.3} s", max.0),
            min: format!("{:.3} {unit}", min.1),
            min_at: format!("{:.3} s", min.0),
            average: format!("{average:.3} {unit}"),
        })
    }

    fn max_value(&self) -> f64 {
        leading_number(&self.max)
    }

    fn average_value(&self) -> f64 {
        leading_number(&self.average)
    }
}

fn leading_number(rendered: &str) -> f64 {
    rendered
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0.0)
}

/// Timing findings of one audio or video track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackAnalysis {
    /// `"Video 1"`, `"Audio 2"`, ...
    pub track: String,
    pub stream_id: String,
    #[serde(rename = "Missing Packets")]
    pub missing_packets: Vec<u64>,
    #[serde(rename = "Missing Packets Count")]
    pub missing_packets_count: String,
    #[serde(rename = "First Frame PTS")]
    pub first_frame_pts: Option<u64>,
    #[serde(rename = "Last Frame PTS")]
    pub last_frame_pts: Option<u64>,
    #[serde(rename = "Duration")]
    pub duration: String,
    #[serde(rename = "Frame Duration")]
    pub frame_duration: String,
    #[serde(rename = "Bitrate")]
    pub bitrate: Option<Extremes>,
    #[serde(rename = "Frame size")]
    pub frame_size: Option<Extremes>,
    #[serde(rename = "GOP", skip_serializing_if = "Option::is_none")]
    pub gop: Option<String>,
    #[serde(
        rename = "First audio packet arrival w.r.t video",
        skip_serializing_if = "Option::is_none"
    )]
    pub first_audio_arrival: Option<String>,
    #[serde(rename = "Audio Boundary Beginning", skip_serializing_if = "Option::is_none")]
    pub boundary_beginning: Option<String>,
    #[serde(rename = "Audio Boundary End", skip_serializing_if = "Option::is_none")]
    pub boundary_end: Option<String>,
    #[serde(rename = "Remarks")]
    pub remarks: BTreeMap<String, String>,
}

/// Packet records with unwrapped PTS, sorted by PTS.
fn timed_packets(packets: &[PacketRecord]) -> Vec<(u64, PacketRecord)> {
    let with_pts: Vec<&PacketRecord> = packets.iter().filter(|p| p.pts.is_some()).collect();
    let full = unwrap_sequence(with_pts.iter().filter_map(|p| p.pts));
    let mut timed: Vec<(u64, PacketRecord)> = full.into_iter().zip(with_pts.into_iter().copied()).collect();
    timed.sort_by_key(|(pts, _)| *pts);
    timed
}

/// PTS values skipped between consecutive packets, stepping by the previous duration.
pub fn missing_packets(packets: &[PacketRecord]) -> Vec<u64> {
    let timed = timed_packets(packets);
    let mut missing = Vec::new();
    for pair in timed.windows(2) {
        let (prev, record) = pair[0];
        let next = pair[1].0;
        let step = record.duration.unwrap_or(0);
        if step == 0 {
            continue;
        }
        let mut expected = prev + step;
        while expected < next {
            missing.push(expected);
            expected += step;
        }
    }
    missing
}

/// First PTS, last PTS and duration `last - first + last duration` in seconds.
pub fn asset_duration(packets: &[PacketRecord]) -> Option<(u64, u64, f64)> {
    let timed = timed_packets(packets);
    let (first_pts, first) = timed.first()?;
    let (last_pts, last) = timed.last()?;
    let seconds = last.pts_time.unwrap_or(0.0) - first.pts_time.unwrap_or(0.0)
        + last.duration_time.unwrap_or(0.0);
    Some((*first_pts, *last_pts, seconds))
}

pub fn frame_duration(frames: &[FrameRecord]) -> String {
    let Some(first) = frames.first().map(|f| f.duration) else {
        return VARIABLE_FRAME_DURATION.to_string();
    };
    match first {
        Some(ticks) if frames.iter().all(|f| f.duration == first) => {
            format_secs_ms(ticks as f64 / 90.0 / 1000.0)
        }
        _ => VARIABLE_FRAME_DURATION.to_string(),
    }
}

/// kbps over consecutive one-second windows from the first frame.
pub fn bitrate_windows(frames: &[FrameRecord]) -> Vec<(f64, f64)> {
    let times: Vec<(f64, u64)> = frames
        .iter()
        .filter_map(|f| Some((f.pts_time?, f.pkt_size.unwrap_or(0))))
        .collect();
    let (Some(start), Some(end)) = (times.first(), times.last()) else {
        return Vec::new();
    };
    let end = end.0;
    let mut windows = Vec::new();
    let mut cursor = start.0;
    while cursor < end {
        let upper = cursor + 1.0;
        let bits: u64 = times
            .iter()
            .filter(|(t, _)| *t >= cursor && *t < upper)
            .map(|(_, size)| size * 8)
            .sum();
        windows.push((cursor, bits as f64 / 1000.0));
        cursor = upper;
    }
    windows
}

fn frame_sizes(frames: &[FrameRecord]) -> Vec<(f64, f64)> {
    frames
        .iter()
        .filter_map(|f| Some((f.pts_time?, f.pkt_size? as f64 / 1024.0)))
        .collect()
}

/// Delay between the first video packet and the video packet preceding the
/// first packet of `audio_index`.
pub fn first_audio_arrival(packets: &[InterleavedPacket], audio_index: u32) -> Option<String> {
    let first_video = packets.iter().find(|p| p.codec_type == CodecType::Video)?;
    let audio_at = packets
        .iter()
        .position(|p| p.codec_type == CodecType::Audio && p.stream_index == audio_index)?;
    let previous_video = packets[..audio_at]
        .iter()
        .rev()
        .find(|p| p.codec_type == CodecType::Video)?;
    let delay = previous_video.pts_time? - first_video.pts_time?;
    (delay > 0.0).then(|| format_secs_ms(delay))
}

/// Reference video track bounds.
#[derive(Debug, Clone, Copy)]
pub(crate) struct VideoBounds {
    pub first_pts: u64,
    pub last_pts: u64,
}

/// Per track-type state for the duration cross-check.
pub(crate) struct DurationCheck<'a> {
    pub total: Option<&'a str>,
    pub media_info: Option<&'a str>,
}

pub(crate) fn analyze_track(
    label: &str,
    number: usize,
    input: &TrackInput,
    interleaved: &[InterleavedPacket],
    reference: Option<VideoBounds>,
    durations: DurationCheck<'_>,
) -> TrackAnalysis {
    let is_video = input.stream.codec_type == CodecType::Video;
    let missing = missing_packets(&input.packets);
    let bounds = asset_duration(&input.packets);
    let duration = format_secs_ms(bounds.map_or(0.0, |(_, _, seconds)| seconds));
    let frame_duration = frame_duration(&input.frames);
    let bitrate = Extremes::from_samples(&bitrate_windows(&input.frames), "kbps");
    let frame_size = Extremes::from_samples(&frame_sizes(&input.frames), "KB");

    let (gop, first_audio, beginning, end) = if is_video {
        let gop = input
            .frames
            .first()
            .map(|f| f.pict_type.clone().unwrap_or_default());
        (gop, None, None, None)
    } else {
        let first_audio = first_audio_arrival(interleaved, input.stream.index);
        let (beginning, end) = match (reference, bounds) {
            (Some(video), Some((a_first, a_last, _))) => {
                let lead = video.first_pts as i64 - a_first as i64;
                let trail = a_last as i64 - video.last_pts as i64;
                (
                    Some(format_secs_ms(lead as f64 / 90.0 / 1000.0)),
                    Some(format_secs_abs_ms(trail as f64 / 90_000.0)),
                )
            }
            _ => (None, None),
        };
        (None, first_audio, beginning, end)
    };

    let mut analysis = TrackAnalysis {
        track: format!("{label} {number}"),
        stream_id: input.stream.id.clone(),
        missing_packets_count: missing.len().to_string(),
        missing_packets: if missing.is_empty() { vec![0] } else { missing },
        first_frame_pts: bounds.map(|(first, _, _)| first),
        last_frame_pts: bounds.map(|(_, last, _)| last),
        duration,
        frame_duration,
        bitrate,
        frame_size,
        gop,
        first_audio_arrival: first_audio,
        boundary_beginning: beginning,
        boundary_end: end,
        remarks: BTreeMap::new(),
    };
    analysis.remarks = remarks(&analysis, label, number, is_video, durations);
    analysis
}

fn remarks(
    analysis: &TrackAnalysis,
    label: &str,
    number: usize,
    is_video: bool,
    durations: DurationCheck<'_>,
) -> BTreeMap<String, String> {
    let mut remarks = BTreeMap::new();
    let mut put = |key: &str, remark: String| {
        remarks.insert(key.to_string(), remark);
    };

    put(
        "Missing Packets",
        if analysis.missing_packets_count == "0" {
            OK.to_string()
        } else {
            "Missing packets detected".to_string()
        },
    );

    let frame_ms = to_ms(&analysis.frame_duration);
    if let Some(beginning) = &analysis.boundary_beginning {
        put(
            "Audio Boundary Beginning",
            if to_ms(beginning) > frame_ms {
                format!("Audio is ahead of video by {beginning}")
            } else {
                OK.to_string()
            },
        );
    }
    if let Some(end) = &analysis.boundary_end {
        put(
            "Audio Boundary End",
            if to_ms(end) > frame_ms {
                format!("Audio is lagging behind video by {end}")
            } else {
                OK.to_string()
            },
        );
    }

    if let Some(gop) = &analysis.gop {
        put(
            "GOP",
            if gop == "I" {
                OK.to_string()
            } else {
                "First frame is not I-Frame".to_string()
            },
        );
    }

    if let Some(arrival) = &analysis.first_audio_arrival {
        put(
            "First audio packet arrival w.r.t video",
            if to_ms(arrival) > INTERLEAVE_LIMIT_MS {
                format!("There is {arrival} delay between first video and audio packet")
            } else {
                OK.to_string()
            },
        );
    }

    put(
        "Frame Duration",
        if analysis.frame_duration == VARIABLE_FRAME_DURATION {
            NOT_OK.to_string()
        } else {
            OK.to_string()
        },
    );

    let size_limit = if is_video {
        VIDEO_FRAME_SIZE_LIMIT_KB
    } else {
        AUDIO_FRAME_SIZE_LIMIT_KB
    };
    if let Some(size) = &analysis.frame_size {
        put(
            "Max Frame size",
            if size.max_value() > size_limit {
                "Frame size exceeds threshold".to_string()
            } else {
                OK.to_string()
            },
        );
    }

    put("Duration", duration_remark(&analysis.duration, label, number, durations));

    if is_video {
        if let Some(bitrate) = &analysis.bitrate {
            let mbps = bitrate.average_value() * 1000.0 / (8.0 * 1024.0 * 1024.0);
            put(
                "Average Bitrate",
                if AVERAGE_BITRATE_MBPS.contains(&mbps) {
                    OK.to_string()
                } else {
                    NOT_OK.to_string()
                },
            );
        }
    }

    remarks
}

/// Later findings replace earlier ones.
fn duration_remark(track: &str, label: &str, number: usize, durations: DurationCheck<'_>) -> String {
    let Some(total) = durations.total else {
        return NOT_OK.to_string();
    };
    let media_info = durations.media_info.unwrap_or("0s 0ms");
    let track_ms = to_ms(track);
    let total_ms = to_ms(total);
    let info_ms = to_ms(media_info);

    let mut remark = NOT_OK.to_string();
    if track_ms <= total_ms && track_ms == info_ms {
        remark = OK.to_string();
    }
    if track_ms > total_ms {
        remark = format!("{label} {number} duration is more than total AD Duration of {total}");
    }
    if info_ms != track_ms {
        remark = format!("{label} {number} duration is not equal to MediaInfo duration of {media_info}");
    }
    remark
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn packet(pts: u64, duration: u64) -> PacketRecord {
        PacketRecord {
            pts: Some(pts),
            pts_time: Some(pts as f64 / 90_000.0),
            duration: Some(duration),
            duration_time: Some(duration as f64 / 90_000.0),
        }
    }

    fn frame(pts_time: f64, duration: u64, size: u64) -> FrameRecord {
        FrameRecord {
            pts: Some((pts_time * 90_000.0) as u64),
            pts_time: Some(pts_time),
            duration: Some(duration),
            duration_time: Some(duration as f64 / 90_000.0),
            pkt_size: Some(size),
            pict_type: Some("I".to_string()),
        }
    }

    #[rstest]
    #[case("0s 40ms", 40)]
    #[case("1s 250ms", 1250)]
    #[case("-1s 250ms", 1250)]
    #[case("30 s 32 ms", 30_032)]
    #[case("1 min 2 s", 62_000)]
    #[case("Variable Frame Duration Detected", 0)]
    fn test_to_ms(#[case] value: &str, #[case] expected: i64) {
        assert_eq!(to_ms(value), expected);
    }

    #[test]
    fn test_missing_packet_in_gap() {
        let packets = [packet(0, 3000), packet(3000, 3000), packet(9000, 3000)];
        assert_eq!(missing_packets(&packets), vec![6000]);
    }

    #[test]
    fn test_missing_packets_sorted_and_wrapped() {
        let modulus = 1u64 << 33;
        let packets = [
            packet(modulus - 3000, 3000),
            packet(3000, 3000),
            packet(0, 3000),
        ];
        assert!(missing_packets(&packets).is_empty());
    }

    #[test]
    fn test_asset_duration() {
        let packets = [packet(90_000, 3600), packet(180_000, 3600)];
        let (first, last, seconds) = asset_duration(&packets).unwrap();
        assert_eq!((first, last), (90_000, 180_000));
        assert_eq!(format_secs_ms(seconds), "1s 40ms");
    }

    #[test]
    fn test_frame_duration() {
        let constant = [frame(0.0, 3600, 1), frame(0.04, 3600, 1)];
        assert_eq!(frame_duration(&constant), "0s 40ms");
        let variable = [frame(0.0, 3600, 1), frame(0.04, 3000, 1)];
        assert_eq!(frame_duration(&variable), VARIABLE_FRAME_DURATION);
    }

    #[test]
    fn test_bitrate_windows() {
        let frames = [frame(0.0, 3600, 1000), frame(0.5, 3600, 1000), frame(1.2, 3600, 500)];
        let windows = bitrate_windows(&frames);
        assert_eq!(windows, vec![(0.0, 16.0), (1.0, 4.0)]);
        let stats = Extremes::from_samples(&windows, "kbps").unwrap();
        assert_eq!(stats.max, "16.000 kbps");
        assert_eq!(stats.min_at, "1.000 s");
        assert_eq!(stats.average, "10.000 kbps");
    }

    #[test]
    fn test_first_audio_arrival() {
        let p = |codec_type, stream_index, t| InterleavedPacket {
            codec_type,
            stream_index,
            pts_time: Some(t),
        };
        let packets = [
            p(CodecType::Video, 0, 1.0),
            p(CodecType::Video, 0, 1.04),
            p(CodecType::Video, 0, 1.08),
            p(CodecType::Audio, 1, 1.0),
        ];
        assert_eq!(first_audio_arrival(&packets, 1).as_deref(), Some("0s 80ms"));
        assert_eq!(first_audio_arrival(&packets[..1], 1), None);
    }

    #[test]
    fn test_duration_remark_order() {
        let check = |total, info| DurationCheck {
            total: Some(total),
            media_info: Some(info),
        };
        assert_eq!(duration_remark("30s 0ms", "Video", 1, check("30s 0ms", "30s 0ms")), OK);
        assert_eq!(
            duration_remark("31s 0ms", "Video", 1, check("30s 0ms", "31s 0ms")),
            "Video 1 duration is more than total AD Duration of 30s 0ms"
        );
        assert_eq!(
            duration_remark("31s 0ms", "Audio", 2, check("30s 0ms", "30s 0ms")),
            "Audio 2 duration is not equal to MediaInfo duration of 30s 0ms"
        );
    }

    #[test]
    fn test_audio_boundary_remarks() {
        let stream = StreamDescriptor {
            index: 1,
            id: "0x101".to_string(),
            codec_type: CodecType::Audio,
        };
        let input = TrackInput {
            stream,
            packets: vec![packet(0, 2880), packet(2880, 2880)],
            frames: vec![frame(0.0, 2880, 100), frame(0.032, 2880, 100)],
        };
        let reference = VideoBounds {
            first_pts: 9000,
            last_pts: 2880,
        };
        let analysis = analyze_track(
            "Audio",
            1,
            &input,
            &[],
            Some(reference),
            DurationCheck {
                total: None,
                media_info: None,
            },
        );
        assert_eq!(analysis.boundary_beginning.as_deref(), Some("0s 100ms"));
        assert_eq!(
            analysis.remarks["Audio Boundary Beginning"],
            "Audio is ahead of video by 0s 100ms"
        );
        assert_eq!(analysis.remarks["Audio Boundary End"], OK);
        assert_eq!(analysis.missing_packets, vec![0]);
        assert_eq!(analysis.remarks["Duration"], NOT_OK);
    }
}
