//! Ad asset analysis over probe and media-info collaborator output.
//!
//! Tracks are numbered per kind in probe order (`Video 1`, `Audio 1`, ...).
//! Audio boundary checks use the first video track as reference.

mod properties;
mod track;

use serde::Serialize;

pub use properties::{
    FilteredMediaInfo, FilteredProperties, OverviewEntry, PropertyRow, TrackProperties,
    filter_media_info, overview, validate_properties,
};
pub use track::{
    Extremes, TrackAnalysis, TrackInput, VARIABLE_FRAME_DURATION, asset_duration,
    bitrate_windows, first_audio_arrival, frame_duration, missing_packets, to_ms,
};

use crate::config::ProjectConfig;
use crate::probe::{CodecType, InterleavedPacket, MediaInfo};
use track::{DurationCheck, VideoBounds, analyze_track};

/// Everything the collaborators reported about one file.
#[derive(Debug, Clone, Default)]
pub struct MediaInput {
    pub tracks: Vec<TrackInput>,
    pub interleaved: Vec<InterleavedPacket>,
    pub info: MediaInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AdAnalysis {
    #[serde(rename = "Audio")]
    pub audio: Vec<TrackAnalysis>,
    #[serde(rename = "Video")]
    pub video: Vec<TrackAnalysis>,
}

impl AdAnalysis {
    pub fn tracks(&self) -> impl Iterator<Item = &TrackAnalysis> {
        self.video.iter().chain(self.audio.iter())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaReport {
    #[serde(rename = "Ad_media_info")]
    pub media_info: FilteredMediaInfo,
    #[serde(rename = "Ad_Analysis")]
    pub analysis: AdAnalysis,
    pub properties: Vec<TrackProperties>,
    pub overview: Vec<OverviewEntry>,
}

impl MediaReport {
    /// Missing PTS per track label, empty for complete tracks.
    pub fn missing_packets(&self) -> impl Iterator<Item = (&str, Vec<u64>)> {
        self.analysis.tracks().map(|t| {
            let missing = if t.missing_packets_count == "0" {
                Vec::new()
            } else {
                t.missing_packets.clone()
            };
            (t.track.as_str(), missing)
        })
    }
}

fn track_duration(tracks: &[FilteredProperties], number: usize) -> Option<&str> {
    tracks
        .get(number - 1)?
        .get("Duration")
        .and_then(|v| v.as_deref())
}

pub fn analyze_media(input: &MediaInput, config: &ProjectConfig) -> MediaReport {
    let media_info = filter_media_info(&input.info, config);
    let total = media_info.general_duration();

    let mut analysis = AdAnalysis::default();
    let mut reference = None;
    for track in input
        .tracks
        .iter()
        .filter(|t| t.stream.codec_type == CodecType::Video)
    {
        let number = analysis.video.len() + 1;
        let result = analyze_track(
            "Video",
            number,
            track,
            &input.interleaved,
            None,
            DurationCheck {
                total,
                media_info: track_duration(&media_info.video, number),
            },
        );
        if reference.is_none()
            && let (Some(first_pts), Some(last_pts)) = (result.first_frame_pts, result.last_frame_pts)
        {
            reference = Some(VideoBounds {
                first_pts,
                last_pts,
            });
        }
        analysis.video.push(result);
    }
    for track in input
        .tracks
        .iter()
        .filter(|t| t.stream.codec_type == CodecType::Audio)
    {
        let number = analysis.audio.len() + 1;
        analysis.audio.push(analyze_track(
            "Audio",
            number,
            track,
            &input.interleaved,
            reference,
            DurationCheck {
                total,
                media_info: track_duration(&media_info.audio, number),
            },
        ));
    }

    MediaReport {
        properties: validate_properties(&media_info, config),
        overview: overview(&media_info, config),
        media_info,
        analysis,
    }
}
