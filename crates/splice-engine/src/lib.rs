//! SCTE-35 ad insertion analysis for MPEG-TS captures
//!
//! This crate turns a captured transport stream into a structured report of
//! the ad breaks it signals: where each splice message landed on the video
//! timeline, how splice-outs pair with splice-ins, and which stream defects
//! were seen on the way.
//!
//! ## Component Overview
//!
//! - `scan`: Two-pass stream scan (tables first, splice messages and their hits second)
//! - `reconcile`: Pairing of splice-out/splice-in events into ad spots
//! - `timeline`: 33-bit PTS arithmetic, wraparound and UTC rendering
//! - `media`: Ad asset checks over probe and media-info output
//! - `report`: Anomaly aggregation and the final report shape
//! - `probe`: Collaborator traits for the external probe tools
//! - `pipeline`: The per-file [`Analyzer`]

pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod media;
pub mod pipeline;
pub mod probe;
pub mod reconcile;
pub mod report;
pub mod scan;
pub mod timeline;

pub use config::{ConfigFinding, ProjectConfig};
pub use error::Error;
pub use event::{SpliceCommandCounts, SpliceEvent};
pub use media::{MediaInput, MediaReport, analyze_media};
pub use pipeline::Analyzer;
pub use probe::{
    ClockSource, CodecType, FrameRecord, InterleavedPacket, MediaInfo, MediaInfoSource,
    MediaProbe, PacketRecord, StreamClock, StreamDescriptor,
};
pub use reconcile::{AdSpot, AnnotatedEvent, Reconciler, SpotType, SpuriousEvent};
pub use report::{AnalysisReport, AnomalyReport, Check};

/// Result type for analysis operations
pub type Result<T> = std::result::Result<T, Error>;
