use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use splice_engine::probe::Properties;
use splice_engine::{MediaInfo, MediaInfoSource, Result};

use super::run_tool;

static SECTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(General|Video|Audio)(?:\s#\d+)?$").unwrap());
static PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^:\n]+)\s+:\s+(.+)$").unwrap());

/// General media properties from the `mediainfo` text report.
#[derive(Debug, Clone)]
pub struct MediaInfoTool {
    program: String,
}

impl Default for MediaInfoTool {
    fn default() -> Self {
        Self {
            program: "mediainfo".to_string(),
        }
    }
}

/// Split the report into sections; other sections (`Text`, `Menu`) are ignored.
pub(crate) fn parse_report(text: &str) -> MediaInfo {
    let mut info = MediaInfo::default();
    let normalized = text.replace("\r\n", "\n");
    for block in normalized.split("\n\n") {
        let mut lines = block.lines().map(str::trim).filter(|l| !l.is_empty());
        let Some(header) = lines.next() else {
            continue;
        };
        let Some(caps) = SECTION.captures(header) else {
            continue;
        };
        let properties: Properties = lines
            .filter_map(|line| {
                let caps = PROPERTY.captures(line)?;
                Some((caps[1].trim().to_string(), caps[2].trim().to_string()))
            })
            .collect();
        match &caps[1] {
            "General" => info.general.push(properties),
            "Video" => info.video.push(properties),
            _ => info.audio.push(properties),
        }
    }
    info
}

impl MediaInfoSource for MediaInfoTool {
    fn media_info(&self, path: &Path) -> Result<MediaInfo> {
        Ok(parse_report(&run_tool(&self.program, [path.as_os_str()])?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "General
Complete name                            : ad.ts
Format                                   : MPEG-TS
Duration                                 : 30 s 32 ms

Video
ID                                       : 256 (0x100)
Format                                   : AVC
Width                                    : 1 920 pixels

Audio #1
Format                                   : AC-3
Channel(s)                               : 6 channels

Audio #2
Format                                   : MPEG Audio
Channel(s)                               : 2 channels

Menu
ID                                       : 4096 (0x1000)
";

    #[test]
    fn test_parse_sections() {
        let info = parse_report(REPORT);
        assert_eq!(info.general.len(), 1);
        assert_eq!(info.general[0]["Duration"], "30 s 32 ms");
        assert_eq!(info.video.len(), 1);
        assert_eq!(info.video[0]["Width"], "1 920 pixels");
        assert_eq!(info.audio.len(), 2);
        assert_eq!(info.audio[0]["Channel(s)"], "6 channels");
        assert_eq!(info.audio[1]["Format"], "MPEG Audio");
    }

    #[test]
    fn test_value_keeps_inner_colons() {
        let info = parse_report("General\nEncoded date                             : UTC 2024-08-02 08:49:38\n");
        assert_eq!(info.general[0]["Encoded date"], "UTC 2024-08-02 08:49:38");
    }
}
