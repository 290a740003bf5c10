//! Environment variable loading helpers.
//!
//! Keeps the fallback chains in one place so callers never reach for
//! `std::env::var` directly.

use std::env;

/// Read `primary` (then each alias), falling back to `default` when unset or empty.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(default)
}

/// Read `primary` (then each alias); empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Parse a boolean variable: 0/false/no/off are false, anything else set is true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// Parse an unsigned integer variable, ignoring malformed values.
pub fn env_u64(primary: &str, aliases: &[&str], default: u64) -> u64 {
    match env_optional(primary, aliases) {
        Some(s) => match s.parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Ignoring malformed {}={:?}, using {}", primary, s, default);
                default
            }
        },
        None => default,
    }
}
