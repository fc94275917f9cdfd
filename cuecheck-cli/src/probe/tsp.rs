use std::ffi::OsStr;
use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use splice_engine::{ClockSource, Result, StreamClock};
use tracing::debug;

use super::run_tool;

static FIRST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"First (?:TDT|STT) UTC time stamp:\s*\.*\s*([0-9]{4}/[0-9]{2}/[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2})")
        .unwrap()
});
static LAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Last (?:TDT|STT) UTC time stamp:\s*\.*\s*([0-9]{4}/[0-9]{2}/[0-9]{2} [0-9]{2}:[0-9]{2}:[0-9]{2})")
        .unwrap()
});

/// Stream clock from the TSDuck `analyze` plugin report.
#[derive(Debug, Clone)]
pub struct Tsp {
    program: String,
}

impl Default for Tsp {
    fn default() -> Self {
        Self {
            program: "tsp".to_string(),
        }
    }
}

fn timestamp(re: &Regex, text: &str) -> Option<DateTime<Utc>> {
    let caps = re.captures(text)?;
    NaiveDateTime::parse_from_str(&caps[1], "%Y/%m/%d %H:%M:%S")
        .ok()
        .map(|t| t.and_utc())
}

pub(crate) fn parse_analysis(text: &str) -> StreamClock {
    StreamClock {
        first_utc: timestamp(&FIRST, text),
        last_utc: timestamp(&LAST, text),
    }
}

impl ClockSource for Tsp {
    fn stream_clock(&self, path: &Path) -> Result<StreamClock> {
        let args = [
            OsStr::new("-I"),
            OsStr::new("file"),
            path.as_os_str(),
            OsStr::new("-P"),
            OsStr::new("analyze"),
            OsStr::new("-O"),
            OsStr::new("drop"),
        ];
        let clock = parse_analysis(&run_tool(&self.program, args)?);
        debug!(first = ?clock.first_utc, last = ?clock.last_utc, "Stream clock");
        Ok(clock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_first_and_last() {
        let text = "\
|  Transport stream id: ............. 1                                       |
|  First TDT UTC time stamp: ........ 2024/08/02 08:49:38                     |
|  Last TDT UTC time stamp: ......... 2024/08/02 08:54:10                     |
";
        let clock = parse_analysis(text);
        assert_eq!(
            clock.first_utc,
            Some(Utc.with_ymd_and_hms(2024, 8, 2, 8, 49, 38).unwrap())
        );
        assert_eq!(
            clock.last_utc,
            Some(Utc.with_ymd_and_hms(2024, 8, 2, 8, 54, 10).unwrap())
        );
    }

    #[test]
    fn test_stt_and_missing() {
        let clock = parse_analysis("First STT UTC time stamp: 2023/01/05 00:00:01\n");
        assert!(clock.first_utc.is_some());
        assert_eq!(clock.last_utc, None);
        assert_eq!(parse_analysis("nothing here"), StreamClock::default());
    }
}
