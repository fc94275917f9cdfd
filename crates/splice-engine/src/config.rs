//! Per-project configuration bundle.
//!
//! The bundle is a JSON object. Unknown keys whose value is an object are
//! read as standard values for a format prefix (`"AVC_Video": {...}`), the
//! same as entries under an explicit `standard_values` key.

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Ad durations accepted for a splice-out/splice-in pair, in seconds.
pub const DEFAULT_ALLOWED_AD_DURATION: [i64; 6] = [10, 15, 20, 30, 45, 60];

/// Format prefixes that carry standard values and not-expected key lists.
pub const FORMAT_PREFIXES: [&str; 6] = [
    "AVC_Video",
    "AC3_2_channels",
    "AC3_6_channels",
    "MPEG_Audio",
    "AAC_LC_SBR_2_channels",
    "EAC3_6_channels",
];

const REQUIRED_KEYS: [&str; 8] = [
    "expected_audio_track_count",
    "expected_video_track_count",
    "supported_audio_formats",
    "supported_ac3_channels",
    "order_of_audio_tracks",
    "keys_not_expected",
    "allowed_ad_duration",
    "enable_debugs",
];

const KNOWN_KEYS: [&str; 4] = ["keys_expected", "skip_pmt_pids", "standard_values", "verify_crc"];

/// Tables whose dumps are promoted from trace to debug level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugTables {
    #[serde(rename = "PAT", default)]
    pub pat: bool,
    #[serde(rename = "PMT", default)]
    pub pmt: bool,
    #[serde(rename = "SCTE", default)]
    pub scte: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FindingKind {
    MissingKey,
    InvalidValue { reason: String },
}

/// A configuration problem reported alongside every analysis that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigFinding {
    pub key: String,
    #[serde(flatten)]
    pub kind: FindingKind,
}

/// Validated, immutable project configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectConfig {
    pub expected_audio_track_count: usize,
    pub expected_video_track_count: usize,
    pub supported_audio_formats: Vec<String>,
    pub supported_ac3_channels: Vec<String>,
    /// Audio format to expected position; unknown formats sort last
    pub order_of_audio_tracks: BTreeMap<String, u32>,
    /// Format prefix to properties that must not be present
    pub keys_not_expected: BTreeMap<String, Vec<String>>,
    /// Track kind (`AVC_Video`, `AC3_Audio`, ...) to the media-info keys kept
    pub keys_expected: BTreeMap<String, Vec<String>>,
    pub allowed_ad_duration: Vec<i64>,
    pub enable_debugs: DebugTables,
    /// PIDs never parsed as PMT even when the PAT lists them
    pub skip_pmt_pids: Vec<u16>,
    /// Format prefix to property to expected value
    pub standard_values: BTreeMap<String, BTreeMap<String, String>>,
    pub verify_crc: bool,
    pub findings: Vec<ConfigFinding>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            expected_audio_track_count: 0,
            expected_video_track_count: 0,
            supported_audio_formats: Vec::new(),
            supported_ac3_channels: Vec::new(),
            order_of_audio_tracks: BTreeMap::new(),
            keys_not_expected: BTreeMap::new(),
            keys_expected: BTreeMap::new(),
            allowed_ad_duration: DEFAULT_ALLOWED_AD_DURATION.to_vec(),
            enable_debugs: DebugTables::default(),
            skip_pmt_pids: Vec::new(),
            standard_values: BTreeMap::new(),
            verify_crc: true,
            findings: Vec::new(),
        }
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn standard_table(key: &str, value: &Value, findings: &mut Vec<ConfigFinding>) -> Option<BTreeMap<String, String>> {
    match value {
        Value::Object(map) => Some(
            map.iter()
                .map(|(k, v)| (k.clone(), value_to_string(v)))
                .collect(),
        ),
        _ => {
            findings.push(ConfigFinding {
                key: key.to_string(),
                kind: FindingKind::InvalidValue {
                    reason: "expected an object of property values".into(),
                },
            });
            None
        }
    }
}

/// Reads one key, recording a finding and falling back to `default` when it
/// is absent (for required keys) or has the wrong shape.
struct Reader<'a> {
    map: &'a Map<String, Value>,
    findings: Vec<ConfigFinding>,
}

impl Reader<'_> {
    fn get<T: DeserializeOwned>(&mut self, key: &str, default: T) -> T {
        match self.map.get(key) {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(v) => v,
                Err(e) => {
                    warn!(key, error = %e, "Invalid configuration value, using default");
                    self.findings.push(ConfigFinding {
                        key: key.to_string(),
                        kind: FindingKind::InvalidValue {
                            reason: e.to_string(),
                        },
                    });
                    default
                }
            },
            None => {
                if REQUIRED_KEYS.contains(&key) {
                    debug!(key, "Configuration key missing, using default");
                    self.findings.push(ConfigFinding {
                        key: key.to_string(),
                        kind: FindingKind::MissingKey,
                    });
                }
                default
            }
        }
    }
}

impl ProjectConfig {
    /// Load and validate a configuration file.
    ///
    /// A missing or unparsable file is fatal. Problems with individual keys
    /// become [`ConfigFinding`]s.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| Error::config_load(path, e.to_string()))?;
        Self::from_json_str(&text).map_err(|reason| Error::config_load(path, reason))
    }

    /// Parse a configuration bundle; the error is the JSON failure message.
    pub fn from_json_str(text: &str) -> std::result::Result<Self, String> {
        let value: Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
        let Value::Object(map) = value else {
            return Err("configuration root must be a JSON object".into());
        };
        Ok(Self::from_map(&map))
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let mut r = Reader {
            map,
            findings: Vec::new(),
        };

        let mut config = Self {
            expected_audio_track_count: r.get("expected_audio_track_count", 0),
            expected_video_track_count: r.get("expected_video_track_count", 0),
            supported_audio_formats: r.get("supported_audio_formats", Vec::new()),
            supported_ac3_channels: r.get("supported_ac3_channels", Vec::new()),
            order_of_audio_tracks: r.get("order_of_audio_tracks", BTreeMap::new()),
            keys_not_expected: r.get("keys_not_expected", BTreeMap::new()),
            keys_expected: r.get("keys_expected", BTreeMap::new()),
            allowed_ad_duration: r.get("allowed_ad_duration", defaults.allowed_ad_duration),
            enable_debugs: r.get("enable_debugs", DebugTables::default()),
            skip_pmt_pids: r.get("skip_pmt_pids", Vec::new()),
            standard_values: BTreeMap::new(),
            verify_crc: r.get("verify_crc", true),
            findings: Vec::new(),
        };

        let mut findings = r.findings;
        if let Some(Value::Object(tables)) = map.get("standard_values") {
            for (prefix, value) in tables {
                if let Some(table) = standard_table(prefix, value, &mut findings) {
                    config.standard_values.insert(prefix.clone(), table);
                }
            }
        } else if map.contains_key("standard_values") {
            findings.push(ConfigFinding {
                key: "standard_values".into(),
                kind: FindingKind::InvalidValue {
                    reason: "expected an object keyed by format prefix".into(),
                },
            });
        }
        for (key, value) in map {
            if REQUIRED_KEYS.contains(&key.as_str()) || KNOWN_KEYS.contains(&key.as_str()) {
                continue;
            }
            if let Value::Object(_) = value
                && let Some(table) = standard_table(key, value, &mut findings)
            {
                config.standard_values.entry(key.clone()).or_insert(table);
            }
        }

        config.findings = findings;
        config
    }

    pub fn standard_values_for(&self, prefix: &str) -> Option<&BTreeMap<String, String>> {
        self.standard_values.get(prefix)
    }

    /// Properties not expected for `prefix`; empty when none are configured.
    pub fn keys_not_expected_for(&self, prefix: &str) -> &[String] {
        self.keys_not_expected
            .get(prefix)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_allowed_duration(&self, seconds: i64) -> bool {
        self.allowed_ad_duration.contains(&seconds)
    }
}
