use regex::Regex;
use std::sync::OnceLock;

pub const ACK_SENTINEL: &str = "HEARTBEAT_OK";
pub const NO_REPLY_SENTINEL: &str = "NO_REPLY";

const SENTINELS: [&str; 2] = [ACK_SENTINEL, NO_REPLY_SENTINEL];

/// Operational prompts that OpenClaw interleaves with real conversation.
/// Keep these specific: a marker that matches ordinary prose suppresses
/// real messages.
const BOILERPLATE_MARKERS: [&str; 4] = [
    "Read HEARTBEAT.md",
    "A scheduled reminder",
    "A cron job",
    "Pre-compaction",
];

/// Synthetic system lines the Feishu bridge injects, e.g. `System: [2026-02-01 ...`.
const FEISHU_SYSTEM_PATTERN: &str = r"System: \[\d{4}-\d{2}-\d{2}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoiseProfile {
    #[default]
    General,
    Feishu,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Signal,
    Empty,
    Sentinel(&'static str),
    Boilerplate(String),
}

impl Classification {
    pub fn is_noise(&self) -> bool {
        !matches!(self, Classification::Signal)
    }

    pub fn describe(&self) -> String {
        match self {
            Classification::Signal => "signal".to_string(),
            Classification::Empty => "empty".to_string(),
            Classification::Sentinel(s) => format!("sentinel {s}"),
            Classification::Boilerplate(marker) => format!("marker `{marker}`"),
        }
    }
}

pub fn is_sentinel(text: &str) -> bool {
    SENTINELS.contains(&text.trim())
}

fn feishu_system_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(FEISHU_SYSTEM_PATTERN).expect("static pattern compiles"))
}

#[derive(Debug, Clone)]
pub struct NoiseFilter {
    markers: Vec<String>,
    system_marker: Option<&'static Regex>,
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::new(NoiseProfile::General, &[])
    }
}

impl NoiseFilter {
    pub fn new(profile: NoiseProfile, extra_markers: &[String]) -> Self {
        let mut markers = BOILERPLATE_MARKERS
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>();
        for marker in extra_markers {
            let trimmed = marker.trim();
            if !trimmed.is_empty() && !markers.iter().any(|m| m == trimmed) {
                markers.push(trimmed.to_string());
            }
        }
        let system_marker = match profile {
            NoiseProfile::General => None,
            NoiseProfile::Feishu => Some(feishu_system_regex()),
        };
        Self {
            markers,
            system_marker,
        }
    }

    pub fn classify(&self, text: &str) -> Classification {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Classification::Empty;
        }
        if let Some(sentinel) = SENTINELS.iter().find(|s| **s == trimmed) {
            return Classification::Sentinel(sentinel);
        }
        if let Some(marker) = self.markers.iter().find(|m| trimmed.contains(m.as_str())) {
            return Classification::Boilerplate(marker.clone());
        }
        if let Some(re) = self.system_marker
            && let Some(found) = re.find(trimmed)
        {
            return Classification::Boilerplate(found.as_str().to_string());
        }
        Classification::Signal
    }

    pub fn is_noise(&self, text: &str) -> bool {
        self.classify(text).is_noise()
    }
}
