//! Settings file: tool locations, timeouts and syslog patterns
//!
//! Settings live in `<config_dir>/idevkit/config.toml`. A different file can
//! be named with `--config` or the `IDEVKIT_CONFIG` environment variable.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use idevkit_core::prelude::*;

use crate::classifier::{LogClassifier, PatternTable};

const CONFIG_DIR: &str = "idevkit";
const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable naming an explicit settings file
pub const CONFIG_ENV: &str = "IDEVKIT_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tools: ToolPaths,
    pub timeouts: TimeoutSettings,
    pub syslog: SyslogSettings,
}

/// Program used for each libimobiledevice tool.
///
/// Defaults to the bare tool name, resolved through `PATH`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolPaths {
    pub idevice_id: String,
    pub ideviceinfo: String,
    pub ideviceinstaller: String,
    pub idevicediagnostics: String,
    pub ideviceactivation: String,
    pub idevicename: String,
    pub idevicescreenshot: String,
    pub idevicecrashreport: String,
    pub idevicesyslog: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            idevice_id: "idevice_id".to_string(),
            ideviceinfo: "ideviceinfo".to_string(),
            ideviceinstaller: "ideviceinstaller".to_string(),
            idevicediagnostics: "idevicediagnostics".to_string(),
            ideviceactivation: "ideviceactivation".to_string(),
            idevicename: "idevicename".to_string(),
            idevicescreenshot: "idevicescreenshot".to_string(),
            idevicecrashreport: "idevicecrashreport".to_string(),
            idevicesyslog: "idevicesyslog".to_string(),
        }
    }
}

impl ToolPaths {
    /// Every tool as `(tool name, configured program)`
    pub fn entries(&self) -> [(&'static str, &str); 9] {
        [
            ("idevice_id", &self.idevice_id),
            ("ideviceinfo", &self.ideviceinfo),
            ("ideviceinstaller", &self.ideviceinstaller),
            ("idevicediagnostics", &self.idevicediagnostics),
            ("ideviceactivation", &self.ideviceactivation),
            ("idevicename", &self.idevicename),
            ("idevicescreenshot", &self.idevicescreenshot),
            ("idevicecrashreport", &self.idevicecrashreport),
            ("idevicesyslog", &self.idevicesyslog),
        ]
    }

    /// Override the program used for `tool`
    pub fn set(&mut self, tool: &str, program: impl Into<String>) -> Result<()> {
        let slot = match tool {
            "idevice_id" => &mut self.idevice_id,
            "ideviceinfo" => &mut self.ideviceinfo,
            "ideviceinstaller" => &mut self.ideviceinstaller,
            "idevicediagnostics" => &mut self.idevicediagnostics,
            "ideviceactivation" => &mut self.ideviceactivation,
            "idevicename" => &mut self.idevicename,
            "idevicescreenshot" => &mut self.idevicescreenshot,
            "idevicecrashreport" => &mut self.idevicecrashreport,
            "idevicesyslog" => &mut self.idevicesyslog,
            other => return Err(Error::config(format!("Unknown tool {:?}", other))),
        };
        *slot = program.into();
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Limit for ordinary one-shot commands, in milliseconds (0 = none)
    pub command_ms: u64,

    /// Limit for slow exports such as crash reports, in milliseconds (0 = none)
    pub long_command_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            command_ms: 30_000,
            long_command_ms: 300_000,
        }
    }
}

impl TimeoutSettings {
    pub fn command(&self) -> Option<Duration> {
        millis(self.command_ms)
    }

    pub fn long_command(&self) -> Option<Duration> {
        millis(self.long_command_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyslogSettings {
    /// TOML pattern table; relative paths are resolved against the
    /// settings file's directory
    pub patterns_file: Option<PathBuf>,

    /// Append the built-in `idevicesyslog` rules after the file's rules
    pub include_builtin: bool,
}

impl Default for SyslogSettings {
    fn default() -> Self {
        Self {
            patterns_file: None,
            include_builtin: true,
        }
    }
}

impl SyslogSettings {
    /// Assemble the pattern table these settings describe.
    pub fn pattern_table(&self) -> Result<PatternTable> {
        let Some(path) = &self.patterns_file else {
            return Ok(PatternTable::builtin());
        };

        let mut table = PatternTable::load(path)?;
        if self.include_builtin {
            table = table.chain(PatternTable::builtin());
        }
        if table.is_empty() {
            return Err(Error::config(format!(
                "pattern file {:?} defines no patterns and built-in patterns are disabled",
                path
            )));
        }
        Ok(table)
    }

    pub fn classifier(&self) -> Result<LogClassifier> {
        LogClassifier::new(&self.pattern_table()?)
    }
}

/// `<config_dir>/idevkit/config.toml`, if the platform has a config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILENAME))
}

/// Load settings from the default location.
///
/// Returns defaults if the file doesn't exist or can't be parsed.
pub fn load_settings() -> Settings {
    let Some(config_path) = default_config_path() else {
        debug!("No config directory on this platform, using defaults");
        return Settings::default();
    };

    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match load_settings_from(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            warn!("{}; using default settings", e);
            Settings::default()
        }
    }
}

/// Load settings from a file the user named explicitly.
///
/// Unlike [`load_settings`], every problem is an error.
pub fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(Error::ConfigNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("Failed to read {:?}: {}", path, e)))?;
    let mut settings: Settings = toml::from_str(&content)
        .map_err(|e| Error::config(format!("Failed to parse {:?}: {}", path, e)))?;

    if let (Some(patterns), Some(base)) = (&settings.syslog.patterns_file, path.parent()) {
        if patterns.is_relative() {
            settings.syslog.patterns_file = Some(base.join(patterns));
        }
    }

    debug!("Loaded settings from {:?}", path);
    Ok(settings)
}

/// Settings for this run: `explicit`, else `IDEVKIT_CONFIG`, else the default
/// location.
pub fn resolve_settings(explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return load_settings_from(path);
    }

    match std::env::var_os(CONFIG_ENV) {
        Some(path) if !path.is_empty() => load_settings_from(Path::new(&path)),
        _ => Ok(load_settings()),
    }
}
