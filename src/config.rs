//! Executor configuration
//!
//! Defaults suit a single worker on a developer machine; every field can be
//! overridden from the environment (a `.env` file is loaded by the binary).

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

/// Default per-stream output cap (8 MiB)
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 8 * 1024 * 1024;

/// Executor configuration
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Directory under which per-request workspaces are created
    pub workspace_root: PathBuf,
    /// Executions allowed to run at once; the rest wait as `queued`
    pub max_concurrent: usize,
    /// Upper bound for the compile step (None = unbounded)
    pub compile_timeout_ms: Option<u64>,
    /// Bytes kept per output stream
    pub output_limit_bytes: usize,
    /// Language table to load instead of the built-in one
    pub languages_path: Option<PathBuf>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("code-exec"),
            max_concurrent: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            compile_timeout_ms: None,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            languages_path: None,
        }
    }
}

impl ExecutorConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut config = Self::default();

        if let Some(root) = lookup("WORKSPACE_ROOT") {
            config.workspace_root = root.into();
        }
        if let Some(n) = parse_var::<usize>(&lookup, "MAX_CONCURRENT_EXECUTIONS")? {
            if n == 0 {
                anyhow::bail!("MAX_CONCURRENT_EXECUTIONS must be at least 1");
            }
            config.max_concurrent = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "COMPILE_TIMEOUT_MS")? {
            config.compile_timeout_ms = Some(ms);
        }
        if let Some(bytes) = parse_var::<usize>(&lookup, "OUTPUT_LIMIT_BYTES")? {
            config.output_limit_bytes = bytes;
        }
        if let Some(path) = lookup("LANGUAGES_CONFIG") {
            config.languages_path = Some(path.into());
        }

        Ok(config)
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.max_concurrent >= 1);
        assert_eq!(config.compile_timeout_ms, None);
        assert_eq!(config.output_limit_bytes, DEFAULT_OUTPUT_LIMIT_BYTES);
        assert!(config.languages_path.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = ExecutorConfig::from_lookup(lookup(&[
            ("WORKSPACE_ROOT", "/srv/runs"),
            ("MAX_CONCURRENT_EXECUTIONS", "3"),
            ("COMPILE_TIMEOUT_MS", " 30000 "),
            ("OUTPUT_LIMIT_BYTES", "4096"),
            ("LANGUAGES_CONFIG", "/etc/languages.toml"),
        ]))
        .unwrap();

        assert_eq!(config.workspace_root, PathBuf::from("/srv/runs"));
        assert_eq!(config.max_concurrent, 3);
        assert_eq!(config.compile_timeout_ms, Some(30_000));
        assert_eq!(config.output_limit_bytes, 4096);
        assert_eq!(
            config.languages_path,
            Some(PathBuf::from("/etc/languages.toml"))
        );
    }

    #[test]
    fn test_invalid_number() {
        let err = ExecutorConfig::from_lookup(lookup(&[("COMPILE_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("COMPILE_TIMEOUT_MS"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        tokio_test::assert_err!(ExecutorConfig::from_lookup(lookup(&[(
            "MAX_CONCURRENT_EXECUTIONS",
            "0"
        )])));
    }
}
