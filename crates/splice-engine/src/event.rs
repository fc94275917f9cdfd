//! Typed splice records produced by the stream scan.

use serde::Serialize;
use ts::{SpliceCommandType, SpliceDescriptor, SpliceInfoSection, SpliceInsert};

use crate::timeline::{PTS_MASK, unwrap_near};

/// Descriptor attached to a splice_insert, as reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CueDescriptor {
    pub tag: u8,
    pub length: u8,
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_avail_id: Option<u32>,
}

impl From<&SpliceDescriptor> for CueDescriptor {
    fn from(d: &SpliceDescriptor) -> Self {
        Self {
            tag: d.tag,
            length: d.length,
            identifier: d.identifier_str(),
            provider_avail_id: d.provider_avail_id,
        }
    }
}

/// One splice_insert message and where it landed on the video timeline.
///
/// PTS fields named `*_pts` other than `pts_time` are full (unwrapped)
/// values on the bound video PID's timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpliceEvent {
    /// 1-based position among the splice_insert messages of this PID
    pub ordinal: usize,
    pub event_id: u32,
    pub splice_pid: u16,
    pub video_pid: Option<u16>,
    pub cancel: bool,
    pub immediate: bool,
    pub out_of_network: bool,
    /// Signalled splice time before pts_adjustment
    pub pts_time: Option<u64>,
    pub pts_adjustment: u64,
    pub duration_ticks: Option<u64>,
    pub auto_return: bool,
    pub unique_program_id: u16,
    pub avail_num: u8,
    pub avails_expected: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<CueDescriptor>,
    /// First I-frame PTS seen on the video PID when the message was hit
    pub first_pes_pts: Option<u64>,
    /// PTS of the first PES on the video PID after the message
    pub splice_hit_pts: Option<u64>,
}

impl SpliceEvent {
    pub fn from_section(
        ordinal: usize,
        splice_pid: u16,
        video_pid: Option<u16>,
        section: &SpliceInfoSection,
        insert: &SpliceInsert,
    ) -> Self {
        Self {
            ordinal,
            event_id: insert.splice_event_id,
            splice_pid,
            video_pid,
            cancel: insert.splice_event_cancel_indicator,
            immediate: insert.splice_immediate_flag,
            out_of_network: insert.out_of_network_indicator,
            pts_time: insert.splice_time,
            pts_adjustment: section.pts_adjustment,
            duration_ticks: insert.duration.map(|d| d.duration),
            auto_return: insert.duration.is_some_and(|d| d.auto_return),
            unique_program_id: insert.unique_program_id,
            avail_num: insert.avail_num,
            avails_expected: insert.avails_expected,
            descriptor: section.descriptor.as_ref().map(CueDescriptor::from),
            first_pes_pts: None,
            splice_hit_pts: None,
        }
    }

    /// Out-of-network indicator as the 0/1 flag used in sequencing.
    pub fn onid(&self) -> u8 {
        u8::from(self.out_of_network)
    }

    /// Signalled splice time with pts_adjustment applied (33-bit).
    pub fn signalled_pts(&self) -> Option<u64> {
        self.pts_time.map(|t| (t + self.pts_adjustment) & PTS_MASK)
    }

    /// Full PTS at which the splice takes effect.
    ///
    /// The signalled time is placed on the video timeline next to the hit.
    /// Immediate splices and splices without a signalled time use the hit.
    /// Without a hit there is no full PTS to place the splice at.
    pub fn start_pts(&self) -> Option<u64> {
        let hit = self.splice_hit_pts?;
        match self.signalled_pts() {
            Some(signalled) if !self.immediate => Some(unwrap_near(signalled, hit)),
            _ => Some(hit),
        }
    }

    pub(crate) fn resolve(&mut self, first_pes_pts: u64, splice_hit_pts: u64) {
        self.first_pes_pts = Some(first_pes_pts);
        self.splice_hit_pts = Some(splice_hit_pts);
    }
}

/// Splice commands seen on all SCTE-35 PIDs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SpliceCommandCounts {
    pub insert: u64,
    pub null: u64,
    pub time_signal: u64,
    pub bandwidth_reservation: u64,
    pub unknown: u64,
}

impl SpliceCommandCounts {
    pub fn record(&mut self, command: SpliceCommandType) {
        match command {
            SpliceCommandType::SpliceInsert => self.insert += 1,
            SpliceCommandType::SpliceNull | SpliceCommandType::SpliceSchedule => self.null += 1,
            SpliceCommandType::TimeSignal => self.time_signal += 1,
            SpliceCommandType::BandwidthReservation => self.bandwidth_reservation += 1,
            SpliceCommandType::PrivateCommand | SpliceCommandType::Unknown(_) => {
                self.unknown += 1
            }
        }
    }

    pub fn total(&self) -> u64 {
        self.insert + self.null + self.time_signal + self.bandwidth_reservation + self.unknown
    }
}
