//! Observability: tracing init and the optional JSONL audit trail.
//!
//! Uses config::ObservabilityConfig for LAGOON_QUIET, LAGOON_LOG_LEVEL,
//! LAGOON_LOG_JSON and LAGOON_AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Initialize tracing. Call once at process startup.
/// When LAGOON_QUIET=1 only errors are logged. RUST_LOG overrides everything.
pub fn init_tracing() {
    let cfg = ObservabilityConfig::from_env();
    let level: String = if cfg.quiet {
        "lagoon=error".to_string()
    } else {
        cfg.log_level.clone()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn audit_path() -> Option<String> {
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut f) => {
            if let Ok(line) = serde_json::to_string(record) {
                let _ = writeln!(f, "{}", line);
            }
        }
        Err(e) => tracing::debug!("audit log {} not writable: {}", path, e),
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit: environment_resolved (cache hit or fresh resolve)
pub fn audit_environment_resolved(project: &str, fingerprint: &str, cache_hit: bool, duration_ms: u64) {
    if let Some(path) = audit_path() {
        let record = json!({
            "ts": now(),
            "event": "environment_resolved",
            "project": project,
            "fingerprint": fingerprint,
            "cache_hit": cache_hit,
            "duration_ms": duration_ms,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: sandbox_launched (exec or supervised child)
pub fn audit_sandbox_launched(
    project: &str,
    mode: &str,
    profile: &str,
    command: Option<&str>,
    memory: Option<&str>,
) {
    if let Some(path) = audit_path() {
        let record = json!({
            "ts": now(),
            "event": "sandbox_launched",
            "project": project,
            "mode": mode,
            "profile": profile,
            "command": command,
            "memory": memory,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit: watch_restart
pub fn audit_watch_restart(project: &str, command: &str, generation: u64) {
    if let Some(path) = audit_path() {
        let record = json!({
            "ts": now(),
            "event": "watch_restart",
            "project": project,
            "command": command,
            "generation": generation,
        });
        append_jsonl(&path, &record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_jsonl_writes_one_line_per_record() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("audit.jsonl");
        let path_str = path.to_string_lossy().to_string();
        append_jsonl(&path_str, &json!({"event": "a"}));
        append_jsonl(&path_str, &json!({"event": "b"}));
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "a");
    }
}
