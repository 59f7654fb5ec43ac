use std::collections::HashMap;
use std::ffi::{OsStr, OsString};

use crate::tool::ToolKind;

/// Variables consulted while building platform install locations.
const LOCATION_VARS: &[&str] = &[
    "PATH",
    "PATHEXT",
    "HOME",
    "LOCALAPPDATA",
    "PROGRAMFILES",
    "PROGRAMFILES(X86)",
];

/// Snapshot of the environment variables detection depends on.
///
/// Detection reads this snapshot instead of the live process environment
/// so it can be driven deterministically (tests, embedding hosts).
#[derive(Debug, Clone, Default)]
pub struct DetectorEnv {
    vars: HashMap<String, OsString>,
}

impl DetectorEnv {
    /// An environment with no variables set.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture every relevant variable from the current process.
    pub fn from_process() -> Self {
        let names = ToolKind::ALL
            .iter()
            .flat_map(|kind| kind.env_vars().iter().copied())
            .chain(LOCATION_VARS.iter().copied());

        let vars = names
            .filter_map(|name| std::env::var_os(name).map(|value| (name.to_string(), value)))
            .collect();

        Self { vars }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// The value of `name`, ignoring empty values.
    pub fn var(&self, name: &str) -> Option<&OsStr> {
        self.vars
            .get(name)
            .map(OsString::as_os_str)
            .filter(|v| !v.is_empty())
    }
}
