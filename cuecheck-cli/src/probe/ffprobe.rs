use std::ffi::OsString;
use std::path::Path;

use serde::Deserialize;
use splice_engine::{
    CodecType, FrameRecord, InterleavedPacket, MediaProbe, PacketRecord, Result, StreamDescriptor,
};
use tracing::debug;

use super::{invalid_output, run_tool};

const FFPROBE: &str = "ffprobe";

/// Frame and packet enumerator over `ffprobe -of json`.
#[derive(Debug, Clone)]
pub struct Ffprobe {
    program: String,
}

impl Default for Ffprobe {
    fn default() -> Self {
        Self {
            program: FFPROBE.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamList {
    #[serde(default)]
    streams: Vec<RawStream>,
}

#[derive(Debug, Deserialize)]
struct RawStream {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    codec_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PacketList {
    #[serde(default)]
    packets: Vec<RawPacket>,
}

#[derive(Debug, Deserialize)]
struct RawPacket {
    pts: Option<i64>,
    pts_time: Option<String>,
    duration: Option<i64>,
    duration_time: Option<String>,
    codec_type: Option<String>,
    stream_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FrameList {
    #[serde(default)]
    frames: Vec<RawFrame>,
}

/// Older ffprobe builds only report the `pkt_*` spellings.
#[derive(Debug, Deserialize)]
struct RawFrame {
    pts: Option<i64>,
    pkt_pts: Option<i64>,
    pts_time: Option<String>,
    pkt_pts_time: Option<String>,
    duration: Option<i64>,
    pkt_duration: Option<i64>,
    duration_time: Option<String>,
    pkt_duration_time: Option<String>,
    pkt_size: Option<String>,
    pict_type: Option<String>,
}

fn ticks(value: Option<i64>) -> Option<u64> {
    value.and_then(|v| u64::try_from(v).ok())
}

fn seconds(value: Option<&str>) -> Option<f64> {
    value.and_then(|v| v.parse().ok())
}

impl From<RawPacket> for PacketRecord {
    fn from(p: RawPacket) -> Self {
        Self {
            pts: ticks(p.pts),
            pts_time: seconds(p.pts_time.as_deref()),
            duration: ticks(p.duration),
            duration_time: seconds(p.duration_time.as_deref()),
        }
    }
}

impl From<RawFrame> for FrameRecord {
    fn from(f: RawFrame) -> Self {
        Self {
            pts: ticks(f.pts.or(f.pkt_pts)),
            pts_time: seconds(f.pts_time.as_deref().or(f.pkt_pts_time.as_deref())),
            duration: ticks(f.duration.or(f.pkt_duration)),
            duration_time: seconds(f.duration_time.as_deref().or(f.pkt_duration_time.as_deref())),
            pkt_size: f.pkt_size.and_then(|s| s.parse().ok()),
            pict_type: f.pict_type,
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T> {
    serde_json::from_str(text).map_err(|e| invalid_output(FFPROBE, e))
}

pub(crate) fn parse_streams(text: &str) -> Result<Vec<StreamDescriptor>> {
    let list: StreamList = parse(text)?;
    Ok(list
        .streams
        .into_iter()
        .map(|s| StreamDescriptor {
            index: s.index,
            id: s.id.unwrap_or_else(|| s.index.to_string()),
            codec_type: CodecType::parse(s.codec_type.as_deref().unwrap_or_default()),
        })
        .collect())
}

pub(crate) fn parse_packets(text: &str) -> Result<Vec<PacketRecord>> {
    let list: PacketList = parse(text)?;
    Ok(list.packets.into_iter().map(PacketRecord::from).collect())
}

pub(crate) fn parse_frames(text: &str) -> Result<Vec<FrameRecord>> {
    let list: FrameList = parse(text)?;
    Ok(list.frames.into_iter().map(FrameRecord::from).collect())
}

pub(crate) fn parse_interleaved(text: &str) -> Result<Vec<InterleavedPacket>> {
    let list: PacketList = parse(text)?;
    Ok(list
        .packets
        .into_iter()
        .map(|p| InterleavedPacket {
            codec_type: CodecType::parse(p.codec_type.as_deref().unwrap_or_default()),
            stream_index: p.stream_index.unwrap_or_default(),
            pts_time: seconds(p.pts_time.as_deref()),
        })
        .collect())
}

impl Ffprobe {
    fn run(&self, args: &[&str], path: &Path) -> Result<String> {
        let mut argv: Vec<OsString> = ["-v", "error", "-of", "json"]
            .iter()
            .chain(args)
            .map(|a| OsString::from(*a))
            .collect();
        argv.push(path.as_os_str().to_owned());
        debug!(program = %self.program, ?args, "Running probe");
        run_tool(&self.program, argv)
    }
}

impl MediaProbe for Ffprobe {
    fn streams(&self, path: &Path) -> Result<Vec<StreamDescriptor>> {
        parse_streams(&self.run(&["-show_format", "-show_streams"], path)?)
    }

    fn packets(&self, path: &Path, stream_id: &str) -> Result<Vec<PacketRecord>> {
        let select = format!("i:{stream_id}");
        parse_packets(&self.run(
            &[
                "-select_streams",
                &select,
                "-show_entries",
                "packet=pts,duration,pts_time,duration_time",
            ],
            path,
        )?)
    }

    fn frames(&self, path: &Path, stream_id: &str) -> Result<Vec<FrameRecord>> {
        let select = format!("i:{stream_id}");
        parse_frames(&self.run(&["-select_streams", &select, "-show_frames"], path)?)
    }

    fn interleaved_packets(&self, path: &Path) -> Result<Vec<InterleavedPacket>> {
        parse_interleaved(&self.run(
            &[
                "-show_entries",
                "packet=pts,duration,codec_type,stream_index,pts_time,duration_time",
            ],
            path,
        )?)
    }
}
