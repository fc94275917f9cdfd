//! DVB Time and Date (TDT) and Time Offset (TOT) tables.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};

use crate::{Result, TsError};

pub const TDT_TABLE_ID: u8 = 0x70;
pub const TOT_TABLE_ID: u8 = 0x73;

/// UTC instant carried by a TDT or TOT section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamTime {
    pub table_id: u8,
    pub utc: DateTime<Utc>,
}

fn from_bcd(value: u8) -> Result<u32> {
    let (hi, lo) = (value >> 4, value & 0x0F);
    if hi > 9 || lo > 9 {
        return Err(TsError::InvalidTimeReference(format!(
            "invalid BCD byte 0x{value:02X}"
        )));
    }
    Ok((hi * 10 + lo) as u32)
}

/// Decode a 40-bit UTC_time field: 16-bit Modified Julian Date then
/// six BCD digits of time of day.
pub fn decode_utc_time(data: &[u8]) -> Result<DateTime<Utc>> {
    let b = data.get(..5).ok_or_else(|| TsError::short(5, data.len()))?;
    let mjd = ((b[0] as u64) << 8) | b[1] as u64;

    let epoch = NaiveDate::from_ymd_opt(1858, 11, 17)
        .ok_or_else(|| TsError::InvalidTimeReference("MJD epoch".into()))?;
    let date = epoch
        .checked_add_days(Days::new(mjd))
        .ok_or_else(|| TsError::InvalidTimeReference(format!("MJD {mjd} out of range")))?;

    let (h, m, s) = (from_bcd(b[2])?, from_bcd(b[3])?, from_bcd(b[4])?);
    let time = NaiveTime::from_hms_opt(h, m, s).ok_or_else(|| {
        TsError::InvalidTimeReference(format!("time of day {h:02}:{m:02}:{s:02}"))
    })?;
    Ok(date.and_time(time).and_utc())
}

impl StreamTime {
    /// Parse a TDT or TOT section. The TOT descriptor loop is not read.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(TsError::short(8, data.len()));
        }
        let table_id = data[0];
        if table_id != TDT_TABLE_ID && table_id != TOT_TABLE_ID {
            return Err(TsError::InvalidTableId {
                expected: TDT_TABLE_ID,
                actual: table_id,
            });
        }
        let utc = decode_utc_time(&data[3..8])?;
        Ok(Self { table_id, utc })
    }
}
