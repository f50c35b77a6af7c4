//! Per-device operations over the libimobiledevice tools
//!
//! Every operation takes the device serial first and rejects a malformed
//! one with [`Error::InvalidSerial`] before anything is spawned.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use plist::{Dictionary, Value};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use idevkit_core::prelude::*;
use idevkit_core::{resolve, DeviceSerial, OptionSet, SessionEvent};

use crate::command::{self, CommandSpec};
use crate::config::Settings;
use crate::decode::{decode_dictionary, decode_plist};
use crate::shortcuts::{self, Resolution, Storage};
use crate::syslog::SyslogSession;

/// Options for [`DeviceClient::properties`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyOptions {
    /// Compact output (`-s`)
    pub simple: bool,

    /// Restrict to one domain (`-q`), e.g. `com.apple.disk_usage`
    pub domain: Option<String>,
}

impl PropertyOptions {
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            simple: false,
            domain: Some(domain.into()),
        }
    }
}

/// Which installed applications [`DeviceClient::packages`] lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageList {
    #[default]
    User,
    System,
    All,
}

#[derive(Debug, Deserialize)]
struct PackageOptions {
    list: PackageList,
}

#[derive(Debug, Deserialize)]
struct DiagnosticsOptions {
    command: String,
    #[serde(default)]
    key: Option<String>,
}

fn package_defaults() -> OptionSet {
    OptionSet::new().with("list", "user")
}

fn diagnostics_defaults() -> OptionSet {
    OptionSet::new()
        .with("command", "diagnostics")
        .with("key", "All")
}

/// Gateway to the attached devices
#[derive(Debug, Clone, Default)]
pub struct DeviceClient {
    settings: Settings,
}

impl DeviceClient {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program).timeout(self.settings.timeouts.command())
    }

    /// Run `spec` and require a zero exit status.
    async fn exec(&self, spec: CommandSpec) -> Result<String> {
        let outcome = command::run(&spec).await?;
        outcome.into_stdout(&spec)
    }

    /// Serials of every attached device.
    ///
    /// Lines of `idevice_id -l` that are not a valid serial are skipped.
    pub async fn list_devices(&self) -> Result<Vec<DeviceSerial>> {
        let spec = self.command(&self.settings.tools.idevice_id).arg("-l");
        let stdout = self.exec(spec).await?;

        let devices: Vec<DeviceSerial> = stdout
            .lines()
            .map(str::trim)
            .filter_map(|line| DeviceSerial::parse(line).ok())
            .collect();

        debug!("Found {} device(s)", devices.len());
        Ok(devices)
    }

    /// Device properties from `ideviceinfo`
    pub async fn properties(&self, serial: &str, options: &PropertyOptions) -> Result<Value> {
        let serial = DeviceSerial::parse(serial)?;
        let stdout = self.exec(self.properties_command(&serial, options)).await?;
        decode_plist(&stdout)
    }

    fn properties_command(&self, serial: &DeviceSerial, options: &PropertyOptions) -> CommandSpec {
        let mut spec = self
            .command(&self.settings.tools.ideviceinfo)
            .args(["-u", serial.as_str(), "-x"]);
        if options.simple {
            spec = spec.arg("-s");
        }
        if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
            spec = spec.args(["-q", domain]);
        }
        spec
    }

    /// One `ideviceinfo` domain as a dictionary
    async fn domain(&self, serial: &str, domain: &str) -> Result<Dictionary> {
        let serial = DeviceSerial::parse(serial)?;
        let spec = self.properties_command(&serial, &PropertyOptions::domain(domain));
        let stdout = self.exec(spec).await?;
        decode_dictionary(&stdout)
    }

    /// Bundle identifiers of installed applications.
    ///
    /// `overrides` is merged over `{"list": "user"}`; `list` may be `user`,
    /// `system` or `all`.
    pub async fn packages(&self, serial: &str, overrides: Option<&OptionSet>) -> Result<Vec<String>> {
        let serial = DeviceSerial::parse(serial)?;
        let options: PackageOptions = resolve(&package_defaults(), overrides).into_typed()?;

        let mut spec = self
            .command(&self.settings.tools.ideviceinstaller)
            .args(["-u", serial.as_str(), "-l", "-o", "xml"]);
        match options.list {
            PackageList::User => {}
            PackageList::System => spec = spec.args(["-o", "list_system"]),
            PackageList::All => spec = spec.args(["-o", "list_all"]),
        }

        let stdout = self.exec(spec).await?;
        let packages = match decode_plist(&stdout)? {
            Value::Array(items) => items,
            _ => return Err(Error::decode("package list", "expected an array")),
        };

        Ok(packages
            .iter()
            .filter_map(Value::as_dictionary)
            .filter_map(|app| app.get("CFBundleIdentifier").and_then(Value::as_string))
            .map(str::to_string)
            .collect())
    }

    /// Run an `idevicediagnostics` query.
    ///
    /// `overrides` is merged over `{"command": "diagnostics", "key": "All"}`.
    /// An empty or null `key` is left off the command line.
    pub async fn diagnostics(&self, serial: &str, overrides: Option<&OptionSet>) -> Result<Value> {
        let serial = DeviceSerial::parse(serial)?;
        let options: DiagnosticsOptions = resolve(&diagnostics_defaults(), overrides).into_typed()?;

        let mut spec = self
            .command(&self.settings.tools.idevicediagnostics)
            .args(["-u", serial.as_str(), options.command.as_str()]);
        if let Some(key) = options.key.filter(|k| !k.is_empty()) {
            spec = spec.arg(key);
        }

        let stdout = self.exec(spec).await?;
        decode_plist(&stdout)
    }

    pub async fn reboot(&self, serial: &str) -> Result<()> {
        self.diagnostics_action(serial, "restart").await
    }

    pub async fn shutdown(&self, serial: &str) -> Result<()> {
        self.diagnostics_action(serial, "shutdown").await
    }

    async fn diagnostics_action(&self, serial: &str, action: &str) -> Result<()> {
        let serial = DeviceSerial::parse(serial)?;
        let spec = self
            .command(&self.settings.tools.idevicediagnostics)
            .args([action, "-u", serial.as_str()]);
        self.exec(spec).await?;
        info!("{} {}", action, serial);
        Ok(())
    }

    pub async fn activate(&self, serial: &str) -> Result<()> {
        self.activation(serial, "activate").await
    }

    pub async fn deactivate(&self, serial: &str) -> Result<()> {
        self.activation(serial, "deactivate").await
    }

    async fn activation(&self, serial: &str, action: &str) -> Result<()> {
        let serial = DeviceSerial::parse(serial)?;
        let spec = self
            .command(&self.settings.tools.ideviceactivation)
            .args([action, "-u", serial.as_str()]);
        self.exec(spec).await?;
        info!("{} {}", action, serial);
        Ok(())
    }

    /// Read the device name, or rename the device when `new_name` is given.
    ///
    /// Returns the tool's output, trimmed.
    pub async fn name(&self, serial: &str, new_name: Option<&str>) -> Result<String> {
        let serial = DeviceSerial::parse(serial)?;
        let mut spec = self
            .command(&self.settings.tools.idevicename)
            .args(["-u", serial.as_str()]);
        if let Some(name) = new_name {
            spec = spec.arg(name);
        }

        let stdout = self.exec(spec).await?;
        Ok(stdout.trim().to_string())
    }

    /// Save a screenshot to `dest` in whatever format the device produces.
    pub async fn screenshot(&self, serial: &str, dest: &Path) -> Result<PathBuf> {
        let serial = DeviceSerial::parse(serial)?;
        let spec = self
            .command(&self.settings.tools.idevicescreenshot)
            .args(["-u", serial.as_str()])
            .arg(dest.to_string_lossy());
        self.exec(spec).await?;
        Ok(dest.to_path_buf())
    }

    /// Crash reports of `app_name`, keyed by file name.
    ///
    /// Reports are exported into a temporary directory which is removed
    /// afterwards. Only `<app_name>*.ips` files are returned.
    pub async fn crash_reports(&self, serial: &str, app_name: &str) -> Result<BTreeMap<String, String>> {
        let serial = DeviceSerial::parse(serial)?;
        let export_dir = tempfile::Builder::new()
            .prefix("idevkit-crash-")
            .tempdir()
            .context("Failed to create crash report export directory")?;

        let spec = CommandSpec::new(&self.settings.tools.idevicecrashreport)
            .args(["-u", serial.as_str(), "-e"])
            .arg(export_dir.path().to_string_lossy())
            .timeout(self.settings.timeouts.long_command());
        self.exec(spec).await?;

        let pattern = Regex::new(&format!(r"^{}.*\.ips$", regex::escape(app_name)))
            .map_err(|e| Error::invalid_option(e.to_string()))?;

        let mut reports = BTreeMap::new();
        let entries = std::fs::read_dir(export_dir.path())
            .with_context(|| format!("Failed to list exported crash reports in {:?}", export_dir.path()))?;
        for entry in entries {
            let entry = entry.context("Failed to read crash report directory entry")?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !pattern.is_match(&file_name) || !entry.file_type()?.is_file() {
                continue;
            }
            let bytes = std::fs::read(entry.path())
                .with_context(|| format!("Failed to read crash report {:?}", entry.path()))?;
            reports.insert(file_name, String::from_utf8_lossy(&bytes).into_owned());
        }

        debug!("Collected {} crash report(s) for {}", reports.len(), app_name);
        Ok(reports)
    }

    pub async fn resolution(&self, serial: &str) -> Result<Resolution> {
        shortcuts::resolution(&self.domain(serial, shortcuts::RESOLUTION_DOMAIN).await?)
    }

    pub async fn storage(&self, serial: &str) -> Result<Storage> {
        shortcuts::storage(&self.domain(serial, shortcuts::STORAGE_DOMAIN).await?)
    }

    pub async fn battery(&self, serial: &str) -> Result<Dictionary> {
        shortcuts::battery(self.domain(serial, shortcuts::BATTERY_DOMAIN).await?)
    }

    pub async fn developer_status(&self, serial: &str) -> Result<String> {
        shortcuts::developer_status(&self.domain(serial, shortcuts::DEVELOPER_DOMAIN).await?)
    }

    /// Start streaming the device log.
    ///
    /// Records and the final `Closed` arrive on `event_tx`. The pattern table
    /// comes from the `[syslog]` settings.
    pub fn syslog(
        &self,
        serial: &str,
        event_tx: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<SyslogSession> {
        let serial = DeviceSerial::parse(serial)?;
        let classifier = self.settings.syslog.classifier()?;
        let spec = CommandSpec::new(&self.settings.tools.idevicesyslog).args(["-u", serial.as_str()]);
        SyslogSession::spawn(&spec, classifier, event_tx)
    }
}
