//! Command-line interface

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Report, Result, WrapErr};
use serde_json::json;

use idevkit_core::{Error, LogLevel, OptionSet};
use idevkit_daemon::{
    plist_to_json, resolve_settings, DeviceClient, PackageList, PropertyOptions, Settings,
    ToolAvailability,
};

use crate::output::print_json;
use crate::stream::stream_syslog;

/// idevkit - Drive attached iOS devices through libimobiledevice
#[derive(Parser, Debug)]
#[command(name = "idevkit", version)]
#[command(about = "Query, control and stream logs from attached iOS devices", long_about = None)]
pub struct Args {
    /// Settings file (default: $IDEVKIT_CONFIG, then <config dir>/idevkit/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override a tool's program, e.g. `--tool ideviceinfo=/opt/bin/ideviceinfo`
    #[arg(long = "tool", global = true, value_name = "NAME=PROGRAM")]
    pub tools: Vec<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List serials of attached devices
    Devices,

    /// Print device properties
    Info {
        serial: String,
        /// Compact property set
        #[arg(long)]
        simple: bool,
        /// Restrict to one domain, e.g. com.apple.disk_usage
        #[arg(long)]
        domain: Option<String>,
    },

    /// List installed application bundle identifiers
    Packages {
        serial: String,
        #[arg(long, value_enum, default_value_t = ListArg::User)]
        list: ListArg,
    },

    /// Run an idevicediagnostics query
    Diagnostics {
        serial: String,
        #[arg(long)]
        command: Option<String>,
        #[arg(long)]
        key: Option<String>,
    },

    /// Restart the device
    Reboot { serial: String },

    /// Power the device off
    Shutdown { serial: String },

    /// Activate the device
    Activate { serial: String },

    /// Deactivate the device
    Deactivate { serial: String },

    /// Print the device name, or rename the device
    Name {
        serial: String,
        new_name: Option<String>,
    },

    /// Save a screenshot
    Screenshot { serial: String, dest: PathBuf },

    /// Export crash reports of an application
    CrashReports { serial: String, app: String },

    /// Screen size in pixels and points
    Resolution { serial: String },

    /// Data partition usage
    Storage { serial: String },

    /// Battery state
    Battery { serial: String },

    /// Developer mode status
    DeveloperStatus { serial: String },

    /// Stream the device log as NDJSON until Ctrl-C
    Syslog {
        serial: String,
        /// Drop records less severe than this
        #[arg(long, value_enum)]
        min_level: Option<LevelArg>,
    },

    /// Check which libimobiledevice tools can be launched
    Doctor,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ListArg {
    User,
    System,
    All,
}

impl From<ListArg> for PackageList {
    fn from(arg: ListArg) -> Self {
        match arg {
            ListArg::User => PackageList::User,
            ListArg::System => PackageList::System,
            ListArg::All => PackageList::All,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum LevelArg {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Fault,
}

impl From<LevelArg> for LogLevel {
    fn from(arg: LevelArg) -> Self {
        match arg {
            LevelArg::Debug => LogLevel::Debug,
            LevelArg::Info => LogLevel::Info,
            LevelArg::Notice => LogLevel::Notice,
            LevelArg::Warning => LogLevel::Warning,
            LevelArg::Error => LogLevel::Error,
            LevelArg::Fault => LogLevel::Fault,
        }
    }
}

/// Settings from `--config` / `IDEVKIT_CONFIG` / the default file, with
/// `--tool` overrides applied.
pub fn load_settings(config: Option<&Path>, tools: &[String]) -> Result<Settings> {
    let mut settings = resolve_settings(config)?;
    for spec in tools {
        let (tool, program) = spec
            .split_once('=')
            .ok_or_else(|| eyre!("--tool expects NAME=PROGRAM, got {:?}", spec))?;
        settings.tools.set(tool.trim(), program.trim())?;
    }
    Ok(settings)
}

/// Exit status for a setup problem: missing tool, bad or missing config
pub const EXIT_FATAL: i32 = 2;

/// Exit status for a device-side failure where retrying may succeed
pub const EXIT_RETRYABLE: i32 = 3;

/// Process exit status for an error returned by [`run`].
///
/// Looks through the report's chain for an [`Error`] and classifies it;
/// anything else exits with 1.
pub fn exit_code(report: &Report) -> i32 {
    let Some(error) = report.chain().find_map(|e| e.downcast_ref::<Error>()) else {
        return 1;
    };

    if error.is_fatal() {
        EXIT_FATAL
    } else if error.is_recoverable() {
        EXIT_RETRYABLE
    } else {
        1
    }
}

/// Execute the parsed command line
pub async fn run(args: Args) -> Result<()> {
    let settings = load_settings(args.config.as_deref(), &args.tools)?;
    let client = DeviceClient::new(settings);

    match args.command {
        Command::Devices => {
            let devices = client.list_devices().await?;
            print_json(&devices);
        }
        Command::Info {
            serial,
            simple,
            domain,
        } => {
            let options = PropertyOptions { simple, domain };
            let value = client.properties(&serial, &options).await?;
            print_json(&plist_to_json(&value));
        }
        Command::Packages { serial, list } => {
            let overrides = OptionSet::new().with("list", json!(PackageList::from(list)));
            let apps = client.packages(&serial, Some(&overrides)).await?;
            print_json(&apps);
        }
        Command::Diagnostics {
            serial,
            command,
            key,
        } => {
            let mut overrides = OptionSet::new();
            if let Some(command) = command {
                overrides = overrides.with("command", command);
            }
            if let Some(key) = key {
                overrides = overrides.with("key", key);
            }
            let value = client.diagnostics(&serial, Some(&overrides)).await?;
            print_json(&plist_to_json(&value));
        }
        Command::Reboot { serial } => {
            client.reboot(&serial).await?;
            print_json(&json!({ "ok": true }));
        }
        Command::Shutdown { serial } => {
            client.shutdown(&serial).await?;
            print_json(&json!({ "ok": true }));
        }
        Command::Activate { serial } => {
            client.activate(&serial).await?;
            print_json(&json!({ "ok": true }));
        }
        Command::Deactivate { serial } => {
            client.deactivate(&serial).await?;
            print_json(&json!({ "ok": true }));
        }
        Command::Name { serial, new_name } => {
            let name = client.name(&serial, new_name.as_deref()).await?;
            print_json(&json!({ "name": name }));
        }
        Command::Screenshot { serial, dest } => {
            let path = client.screenshot(&serial, &dest).await?;
            print_json(&json!({ "path": path }));
        }
        Command::CrashReports { serial, app } => {
            let reports = client.crash_reports(&serial, &app).await?;
            print_json(&reports);
        }
        Command::Resolution { serial } => {
            print_json(&client.resolution(&serial).await?);
        }
        Command::Storage { serial } => {
            print_json(&client.storage(&serial).await?);
        }
        Command::Battery { serial } => {
            let battery = client.battery(&serial).await?;
            print_json(&plist_to_json(&battery.into()));
        }
        Command::DeveloperStatus { serial } => {
            let status = client.developer_status(&serial).await?;
            print_json(&json!({ "status": status }));
        }
        Command::Syslog { serial, min_level } => {
            let mut stdout = std::io::stdout();
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            stream_syslog(
                &client,
                &serial,
                min_level.map(LogLevel::from),
                &mut stdout,
                shutdown,
            )
            .await
            .wrap_err_with(|| format!("log stream for {} failed", serial))?;
        }
        Command::Doctor => {
            let availability = ToolAvailability::check(&client.settings().tools).await;
            print_json(&availability);
            if let Some(message) = availability.unavailable_message() {
                eprintln!("{}", message);
            }
        }
    }

    Ok(())
}
