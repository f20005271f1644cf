//! Delegation to a locally installed docker binary

use anyhow::Context;
use dkr_config::PassthroughConfig;
use dkr_core::EXIT_FAILURE;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Run the real docker binary when passthrough is switched on.
///
/// Returns its exit code, or `None` when dkr should handle the command.
pub fn delegate(config: &PassthroughConfig, args: &[OsString]) -> anyhow::Result<Option<i32>> {
    if !config.is_enabled(std::env::var(&config.env).ok().as_deref()) {
        return Ok(None);
    }

    let current = std::env::current_exe()
        .ok()
        .and_then(|p| p.canonicalize().ok());
    let search = std::env::var_os("PATH").unwrap_or_default();

    let Some(binary) = find_binary(&config.binary, &search, current.as_deref()) else {
        tracing::warn!(
            "{}=1 but no other {} found on PATH, handling the command directly",
            config.env,
            config.binary
        );
        return Ok(None);
    };

    tracing::debug!("Delegating to {}", binary.display());
    let status = std::process::Command::new(&binary)
        .args(args)
        .status()
        .with_context(|| format!("Failed to run {}", binary.display()))?;

    Ok(Some(status.code().unwrap_or(EXIT_FAILURE)))
}

/// First executable `name` on `search`, skipping `current`
pub fn find_binary(name: &str, search: &OsStr, current: Option<&Path>) -> Option<PathBuf> {
    std::env::split_paths(search)
        .map(|dir| dir.join(name))
        .filter(|candidate| is_executable(candidate))
        .find(|candidate| match (current, candidate.canonicalize()) {
            (Some(current), Ok(resolved)) => resolved != current,
            _ => true,
        })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fake_binary(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn test_find_binary_skips_current_executable() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let own = fake_binary(first.path(), "docker");
        let real = fake_binary(second.path(), "docker");

        let search = std::env::join_paths([first.path(), second.path()]).unwrap();
        let current = own.canonicalize().unwrap();

        let found = find_binary("docker", &search, Some(&current)).unwrap();
        assert_eq!(found, real);
    }

    #[test]
    fn test_find_binary_ignores_non_executables() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("docker"), "").unwrap();

        let search = std::env::join_paths([dir.path()]).unwrap();
        assert!(find_binary("docker", &search, None).is_none());
    }

    #[test]
    fn test_delegate_disabled_by_default() {
        let config = PassthroughConfig {
            env: "DKR_TEST_PASSTHROUGH_NEVER_SET".to_string(),
            binary: "docker".to_string(),
        };
        assert_eq!(delegate(&config, &[]).unwrap(), None);
    }
}
