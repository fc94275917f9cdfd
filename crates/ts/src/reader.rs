//! Sequential packet source with sync-byte recovery.
//!
//! [`PacketReader`] yields 188-byte frames from any `Read + Seek` source.
//! When a frame does not begin with a sync byte the reader scans forward
//! for the next candidate and only accepts it when the following packets
//! (at 188-byte stride) also carry sync bytes. Each recovery is recorded.

use std::io::{self, BufReader, Read, Seek, SeekFrom};

use memchr::memchr2;
use tracing::{debug, trace, warn};

use crate::packet::{ALT_SYNC_BYTE, SYNC_BYTE, TS_PACKET_SIZE, TsPacket, is_sync_byte};

/// Number of follow-up packets that must carry a sync byte before a
/// resync candidate is accepted.
pub const DEFAULT_VALIDATION_DEPTH: usize = 8;

const SCAN_CHUNK: usize = 16 * 1024;

/// A sync loss and the boundary where reading resumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRecovery {
    /// Offset of the frame whose first byte was not a sync byte
    pub lost_at: u64,
    /// Offset of the validated packet boundary where reading resumed
    pub resumed_at: u64,
}

impl SyncRecovery {
    /// Bytes skipped to regain sync
    pub fn skipped(&self) -> u64 {
        self.resumed_at - self.lost_at
    }
}

/// Fixed-size packet reader over a byte stream.
pub struct PacketReader<R> {
    inner: BufReader<R>,
    /// Offset of the next frame to read
    position: u64,
    /// Offset the underlying reader is positioned at
    cursor: u64,
    stream_len: u64,
    validation_depth: usize,
    packets_read: u64,
    recoveries: Vec<SyncRecovery>,
    exhausted_at: Option<u64>,
}

impl<R: Read + Seek> PacketReader<R> {
    /// Create a reader starting at the current position of `inner`.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let start = inner.stream_position()?;
        let stream_len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(start))?;
        Ok(Self {
            inner: BufReader::with_capacity(64 * 1024, inner),
            position: start,
            cursor: start,
            stream_len,
            validation_depth: DEFAULT_VALIDATION_DEPTH,
            packets_read: 0,
            recoveries: Vec::new(),
            exhausted_at: None,
        })
    }

    /// Set how many follow-up packets validate a resync candidate.
    pub fn with_validation_depth(mut self, depth: usize) -> Self {
        self.validation_depth = depth.max(1);
        self
    }

    /// Read the next packet.
    ///
    /// Returns `Ok(None)` at end of stream, including when a resync scan
    /// runs off the end. A trailing partial frame ends the stream.
    pub fn next_packet(&mut self) -> io::Result<Option<TsPacket>> {
        loop {
            if self.position + TS_PACKET_SIZE as u64 > self.stream_len {
                if self.position < self.stream_len {
                    trace!(
                        offset = self.position,
                        remaining = self.stream_len - self.position,
                        "Ignoring trailing partial packet"
                    );
                }
                self.position = self.stream_len;
                return Ok(None);
            }

            let mut frame = [0u8; TS_PACKET_SIZE];
            self.read_at(self.position, &mut frame)?;
            let error = match TsPacket::parse(frame) {
                Ok(packet) => {
                    self.position += TS_PACKET_SIZE as u64;
                    self.packets_read += 1;
                    return Ok(Some(packet));
                }
                Err(e) => e,
            };

            let lost_at = self.position;
            debug!(offset = lost_at, error = %error, "Sync byte lost, scanning");
            match self.resync(lost_at + 1)? {
                Some(resumed_at) => {
                    warn!(lost_at, resumed_at, "Recovered packet sync");
                    self.recoveries.push(SyncRecovery {
                        lost_at,
                        resumed_at,
                    });
                    self.position = resumed_at;
                }
                None => {
                    warn!(lost_at, "No packet boundary found before end of stream");
                    self.exhausted_at = Some(lost_at);
                    self.position = self.stream_len;
                    return Ok(None);
                }
            }
        }
    }

    /// Offset of the next frame
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Number of packets yielded so far
    pub fn packets_read(&self) -> u64 {
        self.packets_read
    }

    /// Sync recoveries recorded so far
    pub fn recoveries(&self) -> &[SyncRecovery] {
        &self.recoveries
    }

    /// Offset of the sync loss that could not be recovered, if any.
    pub fn exhausted_at(&self) -> Option<u64> {
        self.exhausted_at
    }

    fn resync(&mut self, from: u64) -> io::Result<Option<u64>> {
        let mut scan_from = from;
        while let Some(candidate) = self.find_sync_from(scan_from)? {
            if self.validate(candidate)? {
                return Ok(Some(candidate));
            }
            trace!(candidate, "Rejected sync candidate");
            scan_from = candidate + 1;
        }
        Ok(None)
    }

    fn find_sync_from(&mut self, mut offset: u64) -> io::Result<Option<u64>> {
        let mut chunk = vec![0u8; SCAN_CHUNK];
        while offset < self.stream_len {
            let want = SCAN_CHUNK.min((self.stream_len - offset) as usize);
            self.read_at(offset, &mut chunk[..want])?;
            if let Some(idx) = memchr2(SYNC_BYTE, ALT_SYNC_BYTE, &chunk[..want]) {
                return Ok(Some(offset + idx as u64));
            }
            offset += want as u64;
        }
        Ok(None)
    }

    /// A candidate must hold a complete packet. Probe positions past the end
    /// of the stream are not held against it.
    fn validate(&mut self, candidate: u64) -> io::Result<bool> {
        if candidate + TS_PACKET_SIZE as u64 > self.stream_len {
            return Ok(false);
        }
        let mut byte = [0u8; 1];
        for k in 1..=self.validation_depth as u64 {
            let probe = candidate + k * TS_PACKET_SIZE as u64;
            if probe >= self.stream_len {
                break;
            }
            self.read_at(probe, &mut byte)?;
            if !is_sync_byte(byte[0]) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        if offset != self.cursor {
            self.inner
                .seek_relative(offset as i64 - self.cursor as i64)?;
        }
        self.inner.read_exact(buf)?;
        self.cursor = offset + buf.len() as u64;
        Ok(())
    }
}

impl<R: Read + Seek> Iterator for PacketReader<R> {
    type Item = io::Result<TsPacket>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_packet().transpose()
    }
}
