//! Media-info filtering and validation against the project standards.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::config::ProjectConfig;
use crate::probe::{MediaInfo, Properties};

use super::track::{NOT_OK, OK};

const FORMAT: &str = "Format";
const CHANNELS: &str = "Channel(s)";
const TWO_CHANNELS: &str = "2 channels";
const SIX_CHANNELS: &str = "6 channels";

/// Track properties kept by the filter; `None` when the track lacks the key.
pub type FilteredProperties = BTreeMap<String, Option<String>>;

/// Media-info reduced to the keys each format is checked on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilteredMediaInfo {
    #[serde(rename = "General")]
    pub general: Vec<Properties>,
    #[serde(rename = "Video")]
    pub video: Vec<FilteredProperties>,
    #[serde(rename = "Audio")]
    pub audio: Vec<FilteredProperties>,
}

impl FilteredMediaInfo {
    pub fn general_duration(&self) -> Option<&str> {
        self.general.first()?.get("Duration").map(String::as_str)
    }
}

fn pick(track: &Properties, keys: &[String]) -> FilteredProperties {
    keys.iter()
        .map(|k| (k.clone(), track.get(k).cloned()))
        .collect()
}

fn value<'a>(track: &'a FilteredProperties, key: &str) -> Option<&'a str> {
    track.get(key).and_then(|v| v.as_deref())
}

/// Keep the `keys_expected` of each supported format.
///
/// AC-3 tracks additionally drop the channel-layout specific keys that are
/// listed as not expected and absent from the track.
pub fn filter_media_info(info: &MediaInfo, config: &ProjectConfig) -> FilteredMediaInfo {
    let keys = |kind: &str| config.keys_expected.get(kind).map(Vec::as_slice);

    let video = info
        .video
        .iter()
        .filter(|t| t.get(FORMAT).map(String::as_str) == Some("AVC"))
        .filter_map(|t| Some(pick(t, keys("AVC_Video")?)))
        .collect();

    let mut audio = Vec::new();
    let mut drop_two = BTreeSet::new();
    let mut drop_six = BTreeSet::new();
    for track in &info.audio {
        let channels = track.get(CHANNELS).map(String::as_str);
        let kind = match track.get(FORMAT).map(String::as_str) {
            Some("AC-3") => "AC3_Audio",
            Some("MPEG Audio") => "MPEG_Audio",
            Some("AAC LC SBR") if channels == Some(TWO_CHANNELS) => "AAC_LC_SBR_Audio",
            Some("E-AC-3") if channels == Some(SIX_CHANNELS) => "EAC3_Audio",
            _ => continue,
        };
        let Some(expected) = keys(kind) else {
            continue;
        };
        let filtered = pick(track, expected);
        if kind == "AC3_Audio" {
            let (layout, drop) = match channels {
                Some(TWO_CHANNELS) => ("AC3_2_channels", &mut drop_two),
                Some(SIX_CHANNELS) => ("AC3_6_channels", &mut drop_six),
                _ => {
                    audio.push(filtered);
                    continue;
                }
            };
            drop.extend(
                config
                    .keys_not_expected_for(layout)
                    .iter()
                    .filter(|k| matches!(filtered.get(*k), Some(None)))
                    .cloned(),
            );
        }
        audio.push(filtered);
    }

    for track in &mut audio {
        if value(track, FORMAT) != Some("AC-3") {
            continue;
        }
        let drop = match value(track, CHANNELS) {
            Some(TWO_CHANNELS) => &drop_two,
            Some(SIX_CHANNELS) => &drop_six,
            _ => continue,
        };
        track.retain(|k, _| !drop.contains(k));
    }

    FilteredMediaInfo {
        general: info.general.clone(),
        video,
        audio,
    }
}

/// One checked property of a track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyRow {
    #[serde(rename = "Item")]
    pub item: String,
    #[serde(rename = "Actual Value")]
    pub actual: Option<String>,
    #[serde(rename = "Expected Value")]
    pub expected: String,
    #[serde(rename = "Remarks")]
    pub remark: String,
}

/// Property rows of one track with the standard table they were checked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackProperties {
    pub track: String,
    pub standard: String,
    pub rows: Vec<PropertyRow>,
}

/// Standard table for a track, `None` when the track is not validated.
fn standard_prefix(track: &FilteredProperties, config: &ProjectConfig) -> Option<&'static str> {
    let channels = value(track, CHANNELS);
    match value(track, FORMAT)? {
        "AVC" => Some("AVC_Video"),
        format if !config.supported_audio_formats.iter().any(|f| f == format) => None,
        "AC-3" => {
            let channels = channels?;
            if !config.supported_ac3_channels.iter().any(|c| c == channels) {
                return None;
            }
            match channels {
                TWO_CHANNELS => Some("AC3_2_channels"),
                SIX_CHANNELS => Some("AC3_6_channels"),
                _ => None,
            }
        }
        "MPEG Audio" => Some("MPEG_Audio"),
        "AAC LC SBR" if channels == Some(TWO_CHANNELS) => Some("AAC_LC_SBR_2_channels"),
        "E-AC-3" if channels == Some(SIX_CHANNELS) => Some("EAC3_6_channels"),
        _ => None,
    }
}

fn property_remark(
    key: &str,
    actual: Option<&str>,
    standard: &BTreeMap<String, String>,
    not_expected: &[String],
) -> String {
    let unexpected = not_expected.iter().any(|k| k == key);
    match (standard.get(key), actual) {
        (Some(std), Some(v)) if std == v => OK.to_string(),
        (None, Some(_)) if !unexpected => OK.to_string(),
        (_, None) => "Property is not present".to_string(),
        _ if unexpected => "Property not expected for this format".to_string(),
        (std, _) => format!(
            "Property value is not as per standard. Expected is {}",
            std.map_or("", String::as_str)
        ),
    }
}

fn track_rows(track: &FilteredProperties, prefix: &str, config: &ProjectConfig) -> Vec<PropertyRow> {
    let empty = BTreeMap::new();
    let standard = config.standard_values_for(prefix).unwrap_or(&empty);
    let not_expected = config.keys_not_expected_for(prefix);
    track
        .iter()
        .map(|(key, actual)| {
            let remark = property_remark(key, actual.as_deref(), standard, not_expected);
            let expected = if not_expected.iter().any(|k| k == key) {
                String::new()
            } else {
                standard
                    .get(key)
                    .cloned()
                    .or_else(|| actual.clone())
                    .unwrap_or_else(|| "0".to_string())
            };
            PropertyRow {
                item: key.clone(),
                actual: actual.clone(),
                expected,
                remark,
            }
        })
        .collect()
}

/// Validate every supported track against its standard table.
pub fn validate_properties(info: &FilteredMediaInfo, config: &ProjectConfig) -> Vec<TrackProperties> {
    let tracks = info
        .video
        .iter()
        .enumerate()
        .map(|(i, t)| (format!("Video {}", i + 1), t))
        .chain(
            info.audio
                .iter()
                .enumerate()
                .map(|(i, t)| (format!("Audio {}", i + 1), t)),
        );
    tracks
        .filter_map(|(label, track)| {
            let prefix = standard_prefix(track, config)?;
            Some(TrackProperties {
                track: label,
                standard: prefix.to_string(),
                rows: track_rows(track, prefix, config),
            })
        })
        .collect()
}

/// One line of the asset component overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewEntry {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Value")]
    pub value: String,
    #[serde(rename = "Remarks")]
    pub remark: String,
}

impl OverviewEntry {
    fn new(kind: impl Into<String>, value: impl Into<String>, remark: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            remark: remark.into(),
        }
    }
}

/// Track counts, audio format support and audio track order.
pub fn overview(info: &FilteredMediaInfo, config: &ProjectConfig) -> Vec<OverviewEntry> {
    let mut entries = Vec::new();
    let video_count = info.video.len();
    let audio_count = info.audio.len();

    entries.push(OverviewEntry::new(
        "Video Tracks",
        video_count.to_string(),
        if video_count == config.expected_video_track_count { OK } else { NOT_OK },
    ));
    entries.push(OverviewEntry::new(
        "Audio Tracks",
        audio_count.to_string(),
        if audio_count == config.expected_audio_track_count { OK } else { NOT_OK },
    ));

    let mut audio_formats = Vec::with_capacity(audio_count);
    for track in &info.audio {
        let format = value(track, FORMAT).unwrap_or_default();
        let channels = value(track, CHANNELS).unwrap_or_default();
        let supported_format = config.supported_audio_formats.iter().any(|f| f == format);
        let ac3_supported = config.supported_ac3_channels.iter().any(|c| c == channels);
        if audio_count == config.expected_audio_track_count {
            if !supported_format {
                entries.push(OverviewEntry::new(
                    "Audio Format",
                    format,
                    format!("{format} format not supported"),
                ));
            } else if format == "AC-3" && !ac3_supported {
                entries.push(OverviewEntry::new(
                    "Audio Channels",
                    channels,
                    format!("{channels} not supported for AC-3"),
                ));
            }
        }
        audio_formats.push(if format == "AC-3" && ac3_supported {
            format!("AC-3 {channels}")
        } else {
            format.to_string()
        });
    }

    let video_formats: Vec<&str> = info
        .video
        .iter()
        .map(|t| value(t, FORMAT).unwrap_or_default())
        .collect();
    entries.push(OverviewEntry::new(
        "A/V Tracks",
        format!(
            "Video: {} [{}], Audio: {} [{}]",
            video_count,
            video_formats.join(", "),
            audio_count,
            audio_formats.join(", ")
        ),
        OK,
    ));

    if audio_count == config.expected_audio_track_count && !config.order_of_audio_tracks.is_empty() {
        let mut expected = audio_formats.clone();
        expected.sort_by_key(|f| config.order_of_audio_tracks.get(f).copied().unwrap_or(u32::MAX));
        let current = audio_formats.join(", ");
        let remark = if expected == audio_formats {
            OK.to_string()
        } else {
            format!(
                "{current} order is not matching expected {}",
                expected.join(", ")
            )
        };
        entries.push(OverviewEntry::new("Audio Track Order", current, remark));
    }

    entries
}
