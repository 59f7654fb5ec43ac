//! Platform-specific Chrome install locations.

use std::path::{Path, PathBuf};

use crate::env::DetectorEnv;
use crate::search::expand_wildcard;

/// Registry keys holding Chrome's install path under "App Paths".
#[cfg_attr(not(windows), allow(dead_code))]
const REGISTRY_KEYS: &[&str] = &[
    r"HKLM\SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\chrome.exe",
    r"HKCU\SOFTWARE\Microsoft\Windows\CurrentVersion\App Paths\chrome.exe",
];

/// Known install locations for the current platform, wildcards expanded.
pub fn known_locations(env: &DetectorEnv) -> Vec<PathBuf> {
    location_patterns(std::env::consts::OS, env)
        .into_iter()
        .flat_map(|pattern| {
            if pattern.to_string_lossy().contains('*') {
                expand_wildcard(&pattern)
            } else {
                vec![pattern]
            }
        })
        .collect()
}

/// Unexpanded location patterns for `os` (a `std::env::consts::OS` value).
pub fn location_patterns(os: &str, env: &DetectorEnv) -> Vec<PathBuf> {
    let var = |name: &str| env.var(name).map(PathBuf::from);

    match os {
        "linux" => vec![
            "/usr/bin/google-chrome".into(),
            "/usr/bin/google-chrome-stable".into(),
            "/usr/bin/chromium".into(),
            "/usr/bin/chromium-browser".into(),
            "/snap/bin/chromium".into(),
            "/opt/google/chrome/chrome".into(),
            "/home/*/.cache/ms-playwright/chromium-*/chrome-linux/chrome".into(),
        ],
        "macos" => {
            let mut paths: Vec<PathBuf> = vec![
                "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".into(),
                "/Applications/Chromium.app/Contents/MacOS/Chromium".into(),
            ];
            if let Some(home) = var("HOME") {
                paths.push(home.join("Applications/Google Chrome.app/Contents/MacOS/Google Chrome"));
            }
            paths
        }
        "windows" => {
            let suffix = Path::new(r"Google\Chrome\Application\chrome.exe");
            let mut paths: Vec<PathBuf> = ["PROGRAMFILES", "PROGRAMFILES(X86)", "LOCALAPPDATA"]
                .into_iter()
                .filter_map(var)
                .map(|base| base.join(suffix))
                .collect();
            paths.push(r"C:\Users\*\AppData\Local\Google\Chrome\Application\chrome.exe".into());
            paths
        }
        _ => Vec::new(),
    }
}

/// Query the Windows registry for Chrome's install path.
#[cfg(windows)]
pub fn registry_lookup() -> Option<PathBuf> {
    REGISTRY_KEYS.iter().find_map(|key| {
        let output = std::process::Command::new("reg")
            .args(["query", key, "/ve"])
            .output()
            .ok()?;
        if !output.status.success() {
            return None;
        }
        parse_reg_default_value(&String::from_utf8_lossy(&output.stdout))
            .filter(|path| crate::search::is_executable(path))
    })
}

#[cfg(not(windows))]
pub fn registry_lookup() -> Option<PathBuf> {
    None
}

/// Extract the default value from `reg query <key> /ve` output, e.g.
/// `    (Default)    REG_SZ    C:\Program Files\...\chrome.exe`.
pub fn parse_reg_default_value(output: &str) -> Option<PathBuf> {
    output.lines().find_map(|line| {
        let (_, value) = line.split_once("REG_SZ")?;
        let value = value.trim().trim_matches('"');
        (!value.is_empty()).then(|| PathBuf::from(value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_reg_query_default_value() {
        let output = "\r\nHKEY_LOCAL_MACHINE\\SOFTWARE\\...\\chrome.exe\r\n    (Default)    REG_SZ    C:\\Program Files\\Google\\Chrome\\Application\\chrome.exe\r\n";
        assert_eq!(
            parse_reg_default_value(output),
            Some(PathBuf::from(
                r"C:\Program Files\Google\Chrome\Application\chrome.exe"
            ))
        );
    }

    #[test]
    fn reg_query_without_value_is_none() {
        assert_eq!(parse_reg_default_value("ERROR: not found"), None);
    }

    #[test]
    fn linux_patterns_include_per_user_wildcard() {
        let patterns = location_patterns("linux", &DetectorEnv::empty());
        assert!(patterns.iter().any(|p| p.to_string_lossy().contains("/home/*/")));
    }

    #[test]
    fn windows_patterns_use_environment_roots() {
        let env = DetectorEnv::empty().with_var("LOCALAPPDATA", r"D:\Users\me\AppData\Local");
        let patterns = location_patterns("windows", &env);
        assert_eq!(patterns.len(), 2);
        assert!(patterns[0].to_string_lossy().starts_with(r"D:\Users\me"));
    }

    #[test]
    fn unknown_platform_has_no_locations() {
        assert!(location_patterns("plan9", &DetectorEnv::empty()).is_empty());
    }
}
