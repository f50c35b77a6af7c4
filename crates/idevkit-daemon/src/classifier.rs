//! Pattern-table classification of device log lines
//!
//! A [`PatternTable`] is an ordered list of regex rules, either the built-in
//! `idevicesyslog` rules or rules loaded from a TOML file. [`LogClassifier`]
//! compiles the table once and tries each rule in order against a line;
//! the first match wins. A line no rule recognises is simply not a record.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{Datelike, Local, NaiveDateTime};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use idevkit_core::prelude::*;
use idevkit_core::{LogLevel, LogRecord};

/// Default layout of the syslog header timestamp, e.g. `Oct  9 10:22:33`
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%b %e %H:%M:%S";

/// Capture names with a dedicated [`LogRecord`] field
const KNOWN_CAPTURES: &[&str] = &["timestamp", "severity", "component", "device", "pid", "message"];

/// `Oct 19 10:22:33 iPhone SpringBoard(FrontBoard)[58] <Notice>: message`
const SYSLOG_LEVELED: &str = r"^(?P<timestamp>[A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2}) (?P<device>\S+) (?P<component>[^\[\]()<>]+?)(?:\((?P<library>[^()]*)\))?(?:\[(?P<pid>\d+)\])? <(?P<severity>[A-Za-z]+)>: (?P<message>.*)$";

/// Older devices omit the level: `Oct 19 10:22:33 iPhone backboardd[63]: message`
const SYSLOG_PLAIN: &str = r"^(?P<timestamp>[A-Z][a-z]{2} +\d{1,2} \d{2}:\d{2}:\d{2}) (?P<device>\S+) (?P<component>[^\[\]()<>]+?)(?:\((?P<library>[^()]*)\))?\[(?P<pid>\d+)\]: (?P<message>.*)$";

/// One recognition rule as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternRule {
    pub name: String,

    /// Regex with named captures (`timestamp`, `severity`, `component`,
    /// `device`, `pid`, `message`; any other name lands in `fields`)
    pub regex: String,

    /// chrono format for the `timestamp` capture. Formats without `%Y` are
    /// completed with the current year.
    #[serde(default)]
    pub timestamp_format: Option<String>,

    /// Severity used when the rule has no `severity` capture or the captured
    /// label is unknown
    #[serde(default)]
    pub default_severity: Option<LogLevel>,
}

/// Ordered list of rules; earlier rules take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternTable {
    #[serde(default, rename = "pattern")]
    pub patterns: Vec<PatternRule>,
}

impl PatternTable {
    /// Rules for the output of `idevicesyslog`
    pub fn builtin() -> Self {
        Self {
            patterns: vec![
                PatternRule {
                    name: "idevicesyslog".to_string(),
                    regex: SYSLOG_LEVELED.to_string(),
                    timestamp_format: None,
                    default_severity: Some(LogLevel::Notice),
                },
                PatternRule {
                    name: "idevicesyslog-plain".to_string(),
                    regex: SYSLOG_PLAIN.to_string(),
                    timestamp_format: None,
                    default_severity: Some(LogLevel::Notice),
                },
            ],
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::config(format!("Invalid pattern table: {}", e)))
    }

    /// Load a pattern table file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read pattern file {:?}: {}", path, e))
        })?;
        let table = Self::from_toml_str(&content)?;
        debug!("Loaded {} log patterns from {:?}", table.patterns.len(), path);
        Ok(table)
    }

    /// Append `other`'s rules after this table's rules
    pub fn chain(mut self, other: PatternTable) -> Self {
        self.patterns.extend(other.patterns);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[derive(Debug, Clone)]
struct CompiledRule {
    name: String,
    regex: Regex,
    timestamp_format: String,
    default_severity: LogLevel,
}

/// Compiled, immutable classifier. Cheap to clone into a session task.
#[derive(Debug, Clone)]
pub struct LogClassifier {
    rules: Vec<CompiledRule>,
}

impl LogClassifier {
    /// Compile every rule of `table`; an invalid regex names the rule.
    pub fn new(table: &PatternTable) -> Result<Self> {
        let rules = table
            .patterns
            .iter()
            .map(|rule| -> Result<CompiledRule> {
                let regex = Regex::new(&rule.regex)
                    .map_err(|e| Error::pattern(&rule.name, e.to_string()))?;
                Ok(CompiledRule {
                    name: rule.name.clone(),
                    regex,
                    timestamp_format: rule
                        .timestamp_format
                        .clone()
                        .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMAT.to_string()),
                    default_severity: rule.default_severity.unwrap_or(LogLevel::Info),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Classifier over [`PatternTable::builtin`]
    pub fn builtin() -> Self {
        Self::new(&PatternTable::builtin()).expect("built-in log patterns must compile")
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Extract a record from one complete line.
    ///
    /// Blank lines and lines no rule matches yield `None`; that is an
    /// expected outcome, not an error.
    pub fn classify(&self, line: &str) -> Option<LogRecord> {
        if line.trim().is_empty() {
            return None;
        }

        self.rules.iter().find_map(|rule| {
            let caps = rule.regex.captures(line)?;
            Some(build_record(rule, &caps, line))
        })
    }
}

fn build_record(rule: &CompiledRule, caps: &Captures<'_>, line: &str) -> LogRecord {
    let text = |name: &str| caps.name(name).map(|m| m.as_str().trim().to_string());

    let severity = text("severity")
        .and_then(|label| LogLevel::from_label(&label))
        .unwrap_or(rule.default_severity);

    let timestamp = text("timestamp").and_then(|ts| parse_timestamp(&ts, &rule.timestamp_format));

    let fields: BTreeMap<String, String> = rule
        .regex
        .capture_names()
        .flatten()
        .filter(|name| !KNOWN_CAPTURES.contains(name))
        .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
        .collect();

    LogRecord {
        severity,
        component: text("component").filter(|c| !c.is_empty()),
        timestamp,
        message: caps
            .name("message")
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| line.to_string()),
        device: text("device"),
        pid: text("pid").and_then(|pid| pid.parse().ok()),
        pattern: rule.name.clone(),
        fields,
        raw: line.to_string(),
    }
}

/// Parse a captured timestamp. Year-less formats get the current local year.
fn parse_timestamp(value: &str, format: &str) -> Option<NaiveDateTime> {
    if format.contains("%Y") || format.contains("%s") {
        return NaiveDateTime::parse_from_str(value, format).ok();
    }
    let year = Local::now().year();
    NaiveDateTime::parse_from_str(&format!("{} {}", year, value), &format!("%Y {}", format))
        .map_err(|e| trace!("Unparseable timestamp {:?}: {}", value, e))
        .ok()
}
