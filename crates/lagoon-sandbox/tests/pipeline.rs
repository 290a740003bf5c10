//! Descriptor → cache → resolver pipeline, driven with in-process resolvers.

use lagoon_core::{EnvironmentSpec, Profile, ProjectPaths};
use lagoon_sandbox::env::{
    cache, cached_environment, prepare_environment, EnvironmentResolver, PrepareError,
    ResolveError, ResolvedEnvironment, PROGRESS_CAPACITY,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};

struct CountingResolver {
    calls: AtomicUsize,
}

impl CountingResolver {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EnvironmentResolver for CountingResolver {
    fn resolve(
        &self,
        descriptor: &Path,
        progress: SyncSender<String>,
    ) -> Result<ResolvedEnvironment, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(descriptor.exists(), "descriptor written before resolve");
        let _ = progress.try_send("copying path '/nix/store/aaa-bash'".to_string());
        Ok(ResolvedEnvironment {
            bash_path: "/nix/store/aaa-bash/bin/bash".to_string(),
            env_path: "/nix/store/bbb-coreutils/bin/env".to_string(),
            path: "/nix/store/aaa-bash/bin:/nix/store/bbb-coreutils/bin".to_string(),
        })
    }
}

struct MissingPackageResolver;

impl EnvironmentResolver for MissingPackageResolver {
    fn resolve(
        &self,
        _descriptor: &Path,
        _progress: SyncSender<String>,
    ) -> Result<ResolvedEnvironment, ResolveError> {
        Err(ResolveError::PackageNotFound {
            name: "pythn311".to_string(),
        })
    }
}

fn spec(packages: &[&str]) -> EnvironmentSpec {
    EnvironmentSpec {
        packages: packages.iter().map(|s| s.to_string()).collect(),
        nixpkgs_commit: "abc123".to_string(),
        nixpkgs_sha256: "0sha".to_string(),
        profile: Profile::Minimal,
        on_enter: None,
    }
}

#[test]
fn test_second_invocation_hits_cache() {
    let project = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::with_root(project.path(), cache_root.path());
    let resolver = CountingResolver::new();

    let (tx, rx) = sync_channel(PROGRESS_CAPACITY);
    let first = prepare_environment(&spec(&["jq"]), &paths, &resolver, tx).unwrap();
    assert!(!first.cache_hit);
    assert_eq!(resolver.calls(), 1);
    let progress: Vec<String> = rx.iter().collect();
    assert_eq!(progress.len(), 1);
    assert!(paths.cache_record().exists());

    let (tx, rx) = sync_channel(PROGRESS_CAPACITY);
    let second = prepare_environment(&spec(&["jq"]), &paths, &resolver, tx).unwrap();
    assert!(second.cache_hit);
    assert_eq!(resolver.calls(), 1);
    assert_eq!(second.env, first.env);
    assert_eq!(second.fingerprint, first.fingerprint);
    // progress sink closed on the hit path too
    assert!(rx.recv().is_err());
}

#[test]
fn test_changed_packages_resolve_again() {
    let project = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::with_root(project.path(), cache_root.path());
    let resolver = CountingResolver::new();

    let (tx, _rx) = sync_channel(PROGRESS_CAPACITY);
    let a = prepare_environment(&spec(&["jq"]), &paths, &resolver, tx).unwrap();
    let (tx, _rx) = sync_channel(PROGRESS_CAPACITY);
    let b = prepare_environment(&spec(&["jq", "ripgrep"]), &paths, &resolver, tx).unwrap();
    assert_eq!(resolver.calls(), 2);
    assert_ne!(a.fingerprint, b.fingerprint);
    assert!(!b.cache_hit);
    assert!(cache::load(&paths.cache_dir, &a.fingerprint).is_none());
}

#[test]
fn test_cached_environment_does_not_resolve() {
    let project = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::with_root(project.path(), cache_root.path());

    assert!(cached_environment(&spec(&["jq"]), &paths).unwrap().is_none());
    assert!(paths.descriptor().exists());

    let resolver = CountingResolver::new();
    let (tx, _rx) = sync_channel(PROGRESS_CAPACITY);
    let prepared = prepare_environment(&spec(&["jq"]), &paths, &resolver, tx).unwrap();
    let (env, fingerprint) = cached_environment(&spec(&["jq"]), &paths).unwrap().unwrap();
    assert_eq!(env, prepared.env);
    assert_eq!(fingerprint, prepared.fingerprint);
}

#[test]
fn test_resolve_failure_leaves_no_cache() {
    let project = tempfile::tempdir().unwrap();
    let cache_root = tempfile::tempdir().unwrap();
    let paths = ProjectPaths::with_root(project.path(), cache_root.path());

    let (tx, _rx) = sync_channel(PROGRESS_CAPACITY);
    let err = prepare_environment(&spec(&["pythn311"]), &paths, &MissingPackageResolver, tx)
        .unwrap_err();
    assert!(matches!(
        err,
        PrepareError::Resolve(ResolveError::PackageNotFound { .. })
    ));
    assert!(err.to_string().contains("package not found: pythn311"));
    assert!(!paths.cache_record().exists());
}
