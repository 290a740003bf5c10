//! Resolution cache: one `env.json` per project cache directory.
//!
//! A record is only returned for an exact fingerprint match. Missing,
//! unreadable and corrupt records all read as a miss.

use lagoon_core::paths::CACHE_RECORD_FILE;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

use super::ResolvedEnvironment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub sum: String,
    #[serde(flatten)]
    pub env: ResolvedEnvironment,
}

/// Look up the resolved environment for `fingerprint` in `dir`.
pub fn load(dir: &Path, fingerprint: &str) -> Option<ResolvedEnvironment> {
    let path = dir.join(CACHE_RECORD_FILE);
    let data = match std::fs::read(&path) {
        Ok(d) => d,
        Err(e) => {
            tracing::debug!(path = %path.display(), "cache miss: {}", e);
            return None;
        }
    };
    let record: CacheRecord = match serde_json::from_slice(&data) {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(path = %path.display(), "cache record unreadable: {}", e);
            return None;
        }
    };
    if record.sum != fingerprint {
        tracing::debug!(cached = %record.sum, wanted = %fingerprint, "cache stale");
        return None;
    }
    Some(record.env)
}

/// Persist `env` under `fingerprint`. The record is written to a temp file in
/// `dir` and renamed into place, so readers see either the old or new record.
pub fn save(dir: &Path, env: &ResolvedEnvironment, fingerprint: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let record = CacheRecord {
        sum: fingerprint.to_string(),
        env: env.clone(),
    };
    let data = serde_json::to_vec_pretty(&record).map_err(std::io::Error::other)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&data)?;
    tmp.flush()?;
    tmp.persist(dir.join(CACHE_RECORD_FILE))
        .map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> ResolvedEnvironment {
        ResolvedEnvironment {
            bash_path: "/nix/store/aaa-bash/bin/bash".to_string(),
            env_path: "/nix/store/bbb-coreutils/bin/env".to_string(),
            path: "/nix/store/aaa-bash/bin:/nix/store/bbb-coreutils/bin".to_string(),
        }
    }

    #[test]
    fn test_load_after_save() {
        let tmp = tempfile::tempdir().unwrap();
        save(tmp.path(), &env(), "0123456789abcdef").unwrap();
        assert_eq!(load(tmp.path(), "0123456789abcdef"), Some(env()));
    }

    #[test]
    fn test_different_fingerprint_is_miss() {
        let tmp = tempfile::tempdir().unwrap();
        save(tmp.path(), &env(), "0123456789abcdef").unwrap();
        assert_eq!(load(tmp.path(), "fedcba9876543210"), None);
    }

    #[test]
    fn test_missing_record_is_miss() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(load(tmp.path(), "0123456789abcdef"), None);
        assert_eq!(load(&tmp.path().join("nope"), "0123456789abcdef"), None);
    }

    #[test]
    fn test_corrupt_record_is_miss() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(CACHE_RECORD_FILE), b"{not json").unwrap();
        assert_eq!(load(tmp.path(), "0123456789abcdef"), None);
    }

    #[test]
    fn test_record_layout() {
        let tmp = tempfile::tempdir().unwrap();
        save(tmp.path(), &env(), "0123456789abcdef").unwrap();
        let raw = std::fs::read_to_string(tmp.path().join(CACHE_RECORD_FILE)).unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["sum"], "0123456789abcdef");
        assert_eq!(v["bash_path"], "/nix/store/aaa-bash/bin/bash");
        assert_eq!(v["env_path"], "/nix/store/bbb-coreutils/bin/env");
        assert!(v["path"].as_str().unwrap().starts_with("/nix/store/"));
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_files() {
        let tmp = tempfile::tempdir().unwrap();
        save(tmp.path(), &env(), "1111111111111111").unwrap();
        save(tmp.path(), &env(), "2222222222222222").unwrap();
        assert_eq!(load(tmp.path(), "1111111111111111"), None);
        assert!(load(tmp.path(), "2222222222222222").is_some());
        let entries = std::fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(entries, 1);
    }
}
