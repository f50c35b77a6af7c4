//! Test utilities for device operations
//!
//! Provides shell-script stand-ins for the libimobiledevice tools so that
//! [`DeviceClient`] can be exercised without a device attached.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::client::DeviceClient;
use crate::config::Settings;

/// A well-formed 40-character serial
pub const TEST_SERIAL: &str = "0123456789abcdef0123456789abcdef01234567";

/// Writes an executable `sh` script at `path`.
pub fn write_script(path: &Path, body: &str) -> PathBuf {
    let content = format!("#!/bin/sh\n{}\n", body);
    std::fs::write(path, content).expect("write fake tool");
    let mut perms = std::fs::metadata(path).expect("stat fake tool").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms).expect("chmod fake tool");
    path.to_path_buf()
}

/// A temporary directory of fake tools plus [`Settings`] pointing at them.
///
/// Each fake records its arguments, one per line, so tests can assert on
/// the exact command line the client built.
pub struct FakeToolbox {
    dir: TempDir,
    settings: Settings,
}

impl FakeToolbox {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create toolbox dir"),
            settings: Settings::default(),
        }
    }

    /// Install a fake for `tool` (e.g. `"ideviceinfo"`) running `body`.
    ///
    /// # Panics
    /// If `tool` is not a known tool name.
    pub fn tool(mut self, tool: &str, body: &str) -> Self {
        let args_file = self.args_file(tool);
        let script = format!(
            "for arg in \"$@\"; do printf '%s\\n' \"$arg\"; done > '{}'\n{}",
            args_file.display(),
            body
        );
        let path = write_script(&self.dir.path().join(tool), &script);
        self.settings
            .tools
            .set(tool, path.to_string_lossy().into_owned())
            .expect("known tool name");
        self
    }

    /// Arguments of the most recent invocation of `tool`, if it ran
    pub fn recorded_args(&self, tool: &str) -> Option<Vec<String>> {
        let content = std::fs::read_to_string(self.args_file(tool)).ok()?;
        Some(content.lines().map(str::to_string).collect())
    }

    fn args_file(&self, tool: &str) -> PathBuf {
        self.dir.path().join(format!("{}.args", tool))
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn client(&self) -> DeviceClient {
        DeviceClient::new(self.settings.clone())
    }
}

impl Default for FakeToolbox {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_points_settings_at_script() {
        let toolbox = FakeToolbox::new().tool("idevicename", "echo hi");
        let program = &toolbox.settings().tools.idevicename;
        assert!(program.starts_with(toolbox.path().to_str().unwrap()));
        assert!(Path::new(program).exists());
    }

    #[test]
    fn test_recorded_args_before_run() {
        let toolbox = FakeToolbox::new().tool("idevicename", "echo hi");
        assert!(toolbox.recorded_args("idevicename").is_none());
    }

    #[test]
    #[should_panic(expected = "known tool name")]
    fn test_unknown_tool_panics() {
        let _ = FakeToolbox::new().tool("adb", "true");
    }
}
