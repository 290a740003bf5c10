pub mod bwrap;
pub mod closure;
pub mod debounce;
pub mod env;
pub mod launcher;
pub mod log;
pub mod preflight;
pub mod registry;
pub mod supervisor;

pub use bwrap::{build_isolation_spec, IsolationSpec, LaunchOptions};
pub use env::{prepare_environment, PreparedEnvironment, ResolvedEnvironment};
pub use launcher::{BwrapLauncher, LaunchError, MemoryLimit};

#[cfg(all(test, unix))]
pub(crate) mod test_support {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable `/bin/sh` script named `name` into `dir`.
    pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }
}
