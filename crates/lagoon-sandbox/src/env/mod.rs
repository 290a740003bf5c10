//! Environment pipeline: descriptor → fingerprint → cache → (resolve) → env.
//!
//! Callers pass the project spec and cache layout; the sandbox launcher only
//! ever sees a `ResolvedEnvironment`.

pub mod cache;
pub mod descriptor;
pub mod resolver;

use lagoon_core::{EnvironmentSpec, ProjectPaths};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::SyncSender;
use std::time::Instant;
use thiserror::Error;

pub use descriptor::{Descriptor, DescriptorError};
pub use resolver::{EnvironmentResolver, NixShellResolver, ResolveError, PROGRESS_CAPACITY};

use crate::info_log;

/// Concrete executables for one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEnvironment {
    /// Shell executable (bound as /bin/sh and /bin/bash)
    pub bash_path: String,
    /// Core-utility `env` executable (bound as /usr/bin/env)
    pub env_path: String,
    /// Colon-joined search path, store entries only
    pub path: String,
}

/// Result of [`prepare_environment`].
#[derive(Debug, Clone)]
pub struct PreparedEnvironment {
    pub env: ResolvedEnvironment,
    pub fingerprint: String,
    pub cache_hit: bool,
}

#[derive(Debug, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Write the descriptor for `spec` and return it. Shared by the pipeline and
/// by commands that only need the fingerprint (status, verify, watch).
pub fn sync_descriptor(
    spec: &EnvironmentSpec,
    paths: &ProjectPaths,
) -> Result<Descriptor, DescriptorError> {
    let descriptor = descriptor::generate(spec);
    descriptor::write_descriptor(&paths.descriptor(), &descriptor)?;
    Ok(descriptor)
}

/// Cached environment for `spec`, without resolving on a miss.
pub fn cached_environment(
    spec: &EnvironmentSpec,
    paths: &ProjectPaths,
) -> Result<Option<(ResolvedEnvironment, String)>, DescriptorError> {
    let descriptor = sync_descriptor(spec, paths)?;
    Ok(cache::load(&paths.cache_dir, &descriptor.fingerprint).map(|env| (env, descriptor.fingerprint)))
}

/// Produce the resolved environment for `spec`, resolving only on a cache miss.
///
/// `progress` is dropped before this returns, on every path.
pub fn prepare_environment(
    spec: &EnvironmentSpec,
    paths: &ProjectPaths,
    resolver: &dyn EnvironmentResolver,
    progress: SyncSender<String>,
) -> Result<PreparedEnvironment, PrepareError> {
    let started = Instant::now();
    let project = paths.project.to_string_lossy();
    let descriptor = sync_descriptor(spec, paths)?;

    if let Some(env) = cache::load(&paths.cache_dir, &descriptor.fingerprint) {
        drop(progress);
        info_log!("environment cache hit ({})", descriptor.fingerprint);
        lagoon_core::observability::audit_environment_resolved(
            &project,
            &descriptor.fingerprint,
            true,
            started.elapsed().as_millis() as u64,
        );
        return Ok(PreparedEnvironment {
            env,
            fingerprint: descriptor.fingerprint,
            cache_hit: true,
        });
    }

    if cfg!(target_arch = "aarch64") {
        eprintln!("⚠ first build on arm64 may compile packages from source; this can take a while");
    }
    info_log!("environment cache miss ({}), resolving", descriptor.fingerprint);
    let env = resolver.resolve(&paths.descriptor(), progress)?;

    if let Err(e) = cache::save(&paths.cache_dir, &env, &descriptor.fingerprint) {
        tracing::warn!("failed to save environment cache: {}", e);
        eprintln!("⚠ could not save environment cache: {}", e);
    }
    lagoon_core::observability::audit_environment_resolved(
        &project,
        &descriptor.fingerprint,
        false,
        started.elapsed().as_millis() as u64,
    );
    Ok(PreparedEnvironment {
        env,
        fingerprint: descriptor.fingerprint,
        cache_hit: false,
    })
}
