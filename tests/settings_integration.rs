//! Integration tests for settings files, `--tool` overrides and custom
//! log pattern tables

use std::fs;

use tempfile::TempDir;

use idevkit::cli::{exit_code, load_settings, EXIT_FATAL};
use idevkit::stream_syslog;
use idevkit_daemon::test_utils::{write_script, TEST_SERIAL};
use idevkit_daemon::DeviceClient;

fn write_config(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("config.toml");
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_tool_flags_override_config_file() {
    let dir = TempDir::new().unwrap();
    let config = write_config(
        &dir,
        r#"
[tools]
ideviceinfo = "/from/config/ideviceinfo"
idevicename = "/from/config/idevicename"
"#,
    );

    let settings = load_settings(
        Some(config.as_path()),
        &["ideviceinfo = /from/flag/ideviceinfo".to_string()],
    )
    .unwrap();

    assert_eq!(settings.tools.ideviceinfo, "/from/flag/ideviceinfo");
    assert_eq!(settings.tools.idevicename, "/from/config/idevicename");
}

#[test]
fn test_malformed_tool_flag_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, "");

    assert!(load_settings(Some(config.as_path()), &["ideviceinfo".to_string()]).is_err());
    assert!(load_settings(Some(config.as_path()), &["adb=/usr/bin/adb".to_string()]).is_err());
}

#[test]
fn test_explicit_config_errors_are_reported() {
    let dir = TempDir::new().unwrap();
    assert!(load_settings(Some(dir.path().join("missing.toml").as_path()), &[]).is_err());

    let broken = write_config(&dir, "[timeouts\ncommand_ms = 1");
    assert!(load_settings(Some(broken.as_path()), &[]).is_err());
}

#[test]
fn test_config_errors_exit_as_fatal() {
    let dir = TempDir::new().unwrap();

    let missing = load_settings(Some(dir.path().join("missing.toml").as_path()), &[]).unwrap_err();
    assert_eq!(exit_code(&missing), EXIT_FATAL);

    let broken = write_config(&dir, "[timeouts\ncommand_ms = 1");
    let broken = load_settings(Some(broken.as_path()), &[]).unwrap_err();
    assert_eq!(exit_code(&broken), EXIT_FATAL);
}

#[tokio::test]
async fn test_custom_pattern_table_end_to_end() {
    let dir = TempDir::new().unwrap();

    fs::write(
        dir.path().join("patterns.toml"),
        r#"
[[pattern]]
name = "app-json"
regex = '^(?P<timestamp>\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}) \[(?P<severity>[A-Z]+)\] (?P<module>\w+): (?P<message>.*)$'
timestamp_format = "%Y-%m-%d %H:%M:%S"
"#,
    )
    .unwrap();

    let syslog = write_script(
        &dir.path().join("fake-idevicesyslog"),
        r#"
echo '2026-10-19 08:30:00 [WARN] network: retrying request'
echo 'Oct 19 10:22:33 iPhone SpringBoard[58] <Notice>: not in the custom table'
"#,
    );

    let config = write_config(
        &dir,
        &format!(
            "[tools]\nidevicesyslog = {:?}\n\n[syslog]\npatterns_file = \"patterns.toml\"\ninclude_builtin = false\n",
            syslog.display().to_string()
        ),
    );

    let client = DeviceClient::new(load_settings(Some(config.as_path()), &[]).unwrap());
    let mut out = Vec::new();
    let summary = stream_syslog(&client, TEST_SERIAL, None, &mut out, std::future::pending())
        .await
        .unwrap();
    assert_eq!(summary.written, 1);

    let text = String::from_utf8(out).unwrap();
    let events: Vec<serde_json::Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(events.len(), 2);
    let record = &events[0];
    assert_eq!(record["pattern"], "app-json");
    assert_eq!(record["severity"], "warning");
    assert_eq!(record["timestamp"], "2026-10-19T08:30:00");
    assert_eq!(record["fields"]["module"], "network");
    assert_eq!(record["message"], "retrying request");
    assert_eq!(events[1]["event"], "closed");
}
