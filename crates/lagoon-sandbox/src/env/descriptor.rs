//! Generate the Nix environment descriptor (`shell.nix`) from a project spec.
//!
//! Output depends only on the spec: same packages (in declared order), same
//! pin, same bytes. The descriptor always provides a shell and the core
//! utilities ahead of the user's packages, since the sandbox has nothing else.

use lagoon_core::fingerprint::content_sum;
use lagoon_core::EnvironmentSpec;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Packages every environment gets, in this order, before the declared ones.
pub const BASE_PACKAGES: &[&str] = &["bash", "coreutils"];

/// Generated descriptor text plus its content fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub text: String,
    pub fingerprint: String,
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("creating cache directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("writing {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render the descriptor for `spec`.
pub fn generate(spec: &EnvironmentSpec) -> Descriptor {
    let mut text = String::with_capacity(256 + spec.packages.len() * 24);
    text.push_str("{ pkgs ? import (fetchTarball {\n");
    text.push_str(&format!(
        "    url = \"https://github.com/NixOS/nixpkgs/archive/{}.tar.gz\";\n",
        spec.nixpkgs_commit
    ));
    text.push_str(&format!("    sha256 = \"{}\";\n", spec.nixpkgs_sha256));
    text.push_str("  }) {}\n");
    text.push_str("}:\n\n");
    text.push_str("pkgs.mkShell {\n");
    text.push_str("  buildInputs = with pkgs; [\n");
    for pkg in BASE_PACKAGES
        .iter()
        .copied()
        .chain(spec.packages.iter().map(String::as_str))
    {
        text.push_str("    ");
        text.push_str(pkg);
        text.push('\n');
    }
    text.push_str("  ];\n");
    text.push_str("}\n");

    let fingerprint = content_sum(text.as_bytes());
    Descriptor { text, fingerprint }
}

/// Write `descriptor` to `path` unless the file there already has the same
/// fingerprint. Returns whether the file was (re)written.
pub fn write_descriptor(path: &Path, descriptor: &Descriptor) -> Result<bool, DescriptorError> {
    if let Ok(existing) = std::fs::read(path) {
        if content_sum(&existing) == descriptor.fingerprint {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| DescriptorError::CreateDir {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, descriptor.text.as_bytes()).map_err(|e| DescriptorError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    tracing::debug!(path = %path.display(), fingerprint = %descriptor.fingerprint, "descriptor written");
    Ok(true)
}
