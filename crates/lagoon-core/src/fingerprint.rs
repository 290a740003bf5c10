//! Content fingerprints.
//!
//! Three fixed-length SHA-256 derived digests:
//! - `content_sum`: 16 hex chars, keys the resolution cache by descriptor bytes
//! - `project_id`: 8 hex chars, names the per-project cache directory
//! - `closure_fingerprint`: full 64 hex chars over a set of store paths

use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Short hex digest of `bytes` (first 8 bytes of SHA-256).
pub fn content_sum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(&digest[..8])
}

/// Short id for an absolute project path (first 4 bytes of SHA-256).
pub fn project_id(abs_path: &str) -> String {
    let digest = Sha256::digest(abs_path.as_bytes());
    hex::encode(&digest[..4])
}

/// Order-independent digest of a set of paths.
///
/// Duplicates collapse, so the result depends only on set membership.
pub fn closure_fingerprint<I, S>(paths: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let set: BTreeSet<String> = paths
        .into_iter()
        .map(|p| p.as_ref().to_string())
        .collect();
    let joined = set.into_iter().collect::<Vec<_>>().join("\n");
    hex::encode(Sha256::digest(joined.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_sum_deterministic() {
        let a = content_sum(b"hello lagoon");
        let b = content_sum(b"hello lagoon");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn test_content_sum_changes() {
        assert_ne!(content_sum(b"aaa"), content_sum(b"bbb"));
    }

    #[test]
    fn test_project_id_length() {
        assert_eq!(project_id("/home/u/project").len(), 8);
        assert_ne!(project_id("/home/u/a"), project_id("/home/u/b"));
    }

    #[test]
    fn test_closure_fingerprint_order_independent() {
        let a = closure_fingerprint(["/nix/store/aaa-bash", "/nix/store/bbb-python"]);
        let b = closure_fingerprint(["/nix/store/bbb-python", "/nix/store/aaa-bash"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_closure_fingerprint_changes_with_content() {
        let a = closure_fingerprint(["/nix/store/aaa-bash"]);
        let b = closure_fingerprint(["/nix/store/aaa-bash", "/nix/store/ccc-evil"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_closure_fingerprint_ignores_duplicates() {
        let a = closure_fingerprint(["/nix/store/aaa", "/nix/store/aaa"]);
        let b = closure_fingerprint(["/nix/store/aaa"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_closure_fingerprint_fixed_length() {
        let empty: [&str; 0] = [];
        assert_eq!(closure_fingerprint(empty).len(), 64);
        let many: Vec<String> = (0..500).map(|i| format!("/nix/store/{i}-pkg")).collect();
        assert_eq!(closure_fingerprint(&many).len(), 64);
    }
}
