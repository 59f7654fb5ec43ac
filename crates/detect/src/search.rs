//! Filesystem helpers for executable lookup.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::env::DetectorEnv;

/// Whether `path` is a regular file the current user may execute.
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// File names to try for `name` in one `PATH` directory.
///
/// On Windows the `PATHEXT` extensions are appended when `name` has none.
fn executable_names(name: &str, env: &DetectorEnv) -> Vec<String> {
    if cfg!(windows) && Path::new(name).extension().is_none() {
        let pathext = env
            .var("PATHEXT")
            .and_then(|v| v.to_str())
            .unwrap_or(".EXE;.CMD;.BAT;.COM")
            .to_string();
        return pathext
            .split(';')
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!("{name}{}", ext.to_ascii_lowercase()))
            .collect();
    }
    vec![name.to_string()]
}

/// Find `name` in the `PATH` of `env`, returning the first executable match.
pub fn find_in_path(name: &str, env: &DetectorEnv) -> Option<PathBuf> {
    let path_var = env.var("PATH")?;
    let names = executable_names(name, env);

    std::env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .flat_map(|dir| names.iter().map(move |n| dir.join(n)))
        .find(|candidate| is_executable(candidate))
}

/// Expand a path whose components may contain a single `*` wildcard each.
///
/// Only whole components are matched (`chromium-*` matches
/// `chromium-1091`); results are sorted so the expansion is stable.
pub fn expand_wildcard(pattern: &Path) -> Vec<PathBuf> {
    let mut current = vec![PathBuf::new()];

    for component in pattern.components() {
        let part = component.as_os_str().to_string_lossy();
        let is_wild = matches!(component, Component::Normal(_)) && part.contains('*');

        if !is_wild {
            for path in &mut current {
                path.push(component.as_os_str());
            }
            continue;
        }

        let (prefix, suffix) = part.split_once('*').unwrap_or((part.as_ref(), ""));
        let mut next = Vec::new();
        for base in &current {
            let Ok(entries) = fs::read_dir(base) else {
                continue;
            };
            let mut matched: Vec<PathBuf> = entries
                .filter_map(Result::ok)
                .filter(|entry| {
                    entry.file_name().to_str().is_some_and(|name| {
                        name.len() >= prefix.len() + suffix.len()
                            && name.starts_with(prefix)
                            && name.ends_with(suffix)
                    })
                })
                .map(|entry| entry.path())
                .collect();
            matched.sort();
            next.extend(matched);
        }
        current = next;
        if current.is_empty() {
            break;
        }
    }

    current
}
