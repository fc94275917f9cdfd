//! Boundary to the external probe tools.
//!
//! The engine never runs a tool itself. Implementations of these traits
//! (the CLI wires `ffprobe`, `mediainfo` and `tsp`) return records, and a
//! failure is reported as [`Error::CollaboratorUnavailable`](crate::Error).

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecType {
    Video,
    Audio,
    Other,
}

impl CodecType {
    pub fn parse(value: &str) -> Self {
        match value {
            "video" => Self::Video,
            "audio" => Self::Audio,
            _ => Self::Other,
        }
    }
}

/// One elementary stream as listed by the probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Stream index within the container
    pub index: u32,
    /// PID rendered as the probe reports it, e.g. `0x100`
    pub id: String,
    pub codec_type: CodecType,
}

/// Packet timing of one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PacketRecord {
    pub pts: Option<u64>,
    pub pts_time: Option<f64>,
    pub duration: Option<u64>,
    pub duration_time: Option<f64>,
}

/// Decoded frame metadata of one stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameRecord {
    pub pts: Option<u64>,
    pub pts_time: Option<f64>,
    pub duration: Option<u64>,
    pub duration_time: Option<f64>,
    pub pkt_size: Option<u64>,
    pub pict_type: Option<String>,
}

/// Packet of the whole multiplex, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct InterleavedPacket {
    pub codec_type: CodecType,
    pub stream_index: u32,
    pub pts_time: Option<f64>,
}

/// Properties of one media-info section (`General`, `Video`, `Audio #n`).
pub type Properties = BTreeMap<String, String>;

/// Media-info output split by section kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    pub general: Vec<Properties>,
    pub video: Vec<Properties>,
    pub audio: Vec<Properties>,
}

/// First and last absolute time references of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamClock {
    pub first_utc: Option<DateTime<Utc>>,
    pub last_utc: Option<DateTime<Utc>>,
}

/// Frame and packet enumerator.
pub trait MediaProbe: Send + Sync {
    fn streams(&self, path: &Path) -> Result<Vec<StreamDescriptor>>;

    /// Packet timing for one stream (`stream_id` as in [`StreamDescriptor::id`]).
    fn packets(&self, path: &Path, stream_id: &str) -> Result<Vec<PacketRecord>>;

    fn frames(&self, path: &Path, stream_id: &str) -> Result<Vec<FrameRecord>>;

    /// Every packet of the file in multiplex order.
    fn interleaved_packets(&self, path: &Path) -> Result<Vec<InterleavedPacket>>;
}

/// General media properties resolver.
pub trait MediaInfoSource: Send + Sync {
    fn media_info(&self, path: &Path) -> Result<MediaInfo>;
}

/// Absolute time reference for the stream start.
pub trait ClockSource: Send + Sync {
    fn stream_clock(&self, path: &Path) -> Result<StreamClock>;
}

/// Render a PID the way the probe names its streams.
pub fn stream_id_for_pid(pid: u16) -> String {
    format!("0x{pid:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_id_for_pid() {
        assert_eq!(stream_id_for_pid(0x100), "0x100");
        assert_eq!(stream_id_for_pid(0x1F4), "0x1f4");
    }

    #[test]
    fn test_codec_type_parse() {
        assert_eq!(CodecType::parse("video"), CodecType::Video);
        assert_eq!(CodecType::parse("audio"), CodecType::Audio);
        assert_eq!(CodecType::parse("data"), CodecType::Other);
    }
}
