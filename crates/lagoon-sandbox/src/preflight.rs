//! Host checks run before any sandbox work. Stops at the first failure.

use lagoon_core::config::ToolsConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Kernel switch for unprivileged user namespaces (Debian/Ubuntu kernels).
pub const USERNS_SYSCTL: &str = "/proc/sys/kernel/unprivileged_userns_clone";

#[derive(Debug, Error)]
pub enum PreflightError {
    #[error("bubblewrap not found.\n  install: sudo apt install bubblewrap")]
    BwrapMissing,

    #[error("nix not found.\n  install: sh <(curl -L https://nixos.org/nix/install) --no-daemon\n  then: source ~/.nix-profile/etc/profile.d/nix.sh")]
    NixMissing,

    #[error("user namespaces are disabled on this system.\n  lagoon requires unprivileged user namespaces to sandbox environments.\n  to enable (requires root, ask your sysadmin):\n    sudo sysctl -w kernel.unprivileged_userns_clone=1\n  to make it permanent:\n    echo 'kernel.unprivileged_userns_clone=1' | sudo tee /etc/sysctl.d/99-userns.conf")]
    UsernsDisabled,
}

/// Check bwrap, nix-shell and user namespace support, in that order.
pub fn run_all(tools: &ToolsConfig) -> Result<(), PreflightError> {
    check_tool(&tools.bwrap).ok_or(PreflightError::BwrapMissing)?;
    check_tool(&tools.nix_shell).ok_or(PreflightError::NixMissing)?;
    check_userns(Path::new(USERNS_SYSCTL))
}

fn check_tool(name: &str) -> Option<PathBuf> {
    match which::which(name) {
        Ok(p) => {
            tracing::debug!(tool = name, path = %p.display(), "found");
            Some(p)
        }
        Err(_) => None,
    }
}

/// A missing sysctl file means the kernel allows namespaces by default.
pub fn check_userns(sysctl: &Path) -> Result<(), PreflightError> {
    match std::fs::read_to_string(sysctl) {
        Ok(v) if v.trim() == "0" => Err(PreflightError::UsernsDisabled),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_userns_missing_file_is_ok() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(check_userns(&tmp.path().join("nope")).is_ok());
    }

    #[test]
    fn test_userns_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let f = tmp.path().join("unprivileged_userns_clone");
        std::fs::write(&f, "0\n").unwrap();
        let err = check_userns(&f).unwrap_err();
        assert!(err.to_string().contains("sysctl -w"));
        std::fs::write(&f, "1\n").unwrap();
        assert!(check_userns(&f).is_ok());
    }

    #[test]
    fn test_missing_bwrap_stops_first() {
        let tools = ToolsConfig {
            bwrap: "/nonexistent/lagoon-test/bwrap".to_string(),
            nix_shell: "/nonexistent/lagoon-test/nix-shell".to_string(),
            ..ToolsConfig::default()
        };
        assert!(matches!(run_all(&tools), Err(PreflightError::BwrapMissing)));
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_nix_shell() {
        let tmp = tempfile::tempdir().unwrap();
        let bwrap = crate::test_support::write_script(tmp.path(), "bwrap", "exit 0\n");
        let tools = ToolsConfig {
            bwrap: bwrap.to_string_lossy().to_string(),
            nix_shell: "/nonexistent/lagoon-test/nix-shell".to_string(),
            ..ToolsConfig::default()
        };
        let err = run_all(&tools).unwrap_err();
        assert!(matches!(err, PreflightError::NixMissing));
        assert!(err.to_string().contains("nixos.org/nix/install"));
    }
}
