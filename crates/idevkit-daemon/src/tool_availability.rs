//! Tool availability checking for device operations
//!
//! Probes each configured libimobiledevice tool by launching it with `-h`.
//! Only a failure to launch counts as missing; the exit status of the help
//! invocation varies between tool versions and is ignored.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use idevkit_core::prelude::*;

use crate::command::{self, CommandSpec};
use crate::config::ToolPaths;

/// Upper bound for a single help probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Availability of the external tools, keyed by tool name
#[derive(Debug, Clone, Default, Serialize)]
pub struct ToolAvailability {
    pub tools: BTreeMap<&'static str, ToolStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStatus {
    pub program: String,
    pub available: bool,
}

impl ToolAvailability {
    /// Probe every tool (run once at startup)
    pub async fn check(paths: &ToolPaths) -> Self {
        let probes = paths.entries().map(|(tool, program)| async move {
            let available = Self::probe(program).await;
            (
                tool,
                ToolStatus {
                    program: program.to_string(),
                    available,
                },
            )
        });

        let mut tools = BTreeMap::new();
        for probe in probes {
            let (tool, status) = probe.await;
            tools.insert(tool, status);
        }
        Self { tools }
    }

    async fn probe(program: &str) -> bool {
        let spec = CommandSpec::new(program).arg("-h").timeout(Some(PROBE_TIMEOUT));
        match command::run(&spec).await {
            Ok(_) => true,
            Err(e) => {
                debug!("{} check failed: {}", program, e);
                false
            }
        }
    }

    pub fn is_available(&self, tool: &str) -> bool {
        self.tools.get(tool).is_some_and(|status| status.available)
    }

    /// Names of the tools that could not be launched
    pub fn missing(&self) -> Vec<&'static str> {
        self.tools
            .iter()
            .filter(|(_, status)| !status.available)
            .map(|(tool, _)| *tool)
            .collect()
    }

    pub fn all_available(&self) -> bool {
        self.tools.values().all(|status| status.available)
    }

    /// Get user-friendly message for missing tools
    pub fn unavailable_message(&self) -> Option<&'static str> {
        if self.all_available() {
            return None;
        }

        #[cfg(target_os = "macos")]
        {
            Some("libimobiledevice not found. Install it with `brew install libimobiledevice ideviceinstaller`, or set tool paths under [tools] in config.toml.")
        }

        #[cfg(not(target_os = "macos"))]
        {
            Some("libimobiledevice not found. Install your distribution's libimobiledevice-utils and ideviceinstaller packages, or set tool paths under [tools] in config.toml.")
        }
    }
}
