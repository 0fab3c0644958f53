//! LeiXing checker configuration
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high → low):
//! 1. Explicit builder calls (`CheckerConfig::with_concurrency_limit` ...)
//! 2. Environment variables (LEIXING_CONCURRENCY, LEIXING_COMPILE, LEIXING_WARNINGS, LEIXING_LOG)
//! 3. Project-level file (leixing.toml)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use leixing::util::config::load_config;
//!
//! let config = load_config("leixing.toml").unwrap().with_env_overrides();
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::util::logger::{self, LogLevel};

/// 默认并发上限：很大，实际线程数还受可用 CPU 数限制
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 10_000;

/// Type checker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    /// Fan-out limit of the method-body worker pool; `1` checks sequentially
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Invoke the compile hook for every checked method/macro body
    #[serde(default)]
    pub compile: bool,
    /// Report warnings (failures are always reported)
    #[serde(default = "default_true")]
    pub warnings: bool,
    /// Log level used by `util::logger` when the host lets the checker initialise logging
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_concurrency_limit() -> usize {
    DEFAULT_CONCURRENCY_LIMIT
}

fn default_true() -> bool {
    true
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            compile: false,
            warnings: true,
            log_level: LogLevel::Info,
        }
    }
}

impl CheckerConfig {
    /// 确定性配置（单线程），测试中使用
    pub fn sequential() -> Self {
        Self {
            concurrency_limit: 1,
            ..Self::default()
        }
    }

    pub fn with_concurrency_limit(
        mut self,
        limit: usize,
    ) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn with_compile(
        mut self,
        compile: bool,
    ) -> Self {
        self.compile = compile;
        self
    }

    pub fn with_warnings(
        mut self,
        warnings: bool,
    ) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_log_level(
        mut self,
        level: LogLevel,
    ) -> Self {
        self.log_level = level;
        self
    }

    /// 按 `log_level` 安装全局日志；已有全局订阅者时返回 `false`
    pub fn init_logging(&self) -> bool {
        logger::init_with_level(self.log_level)
    }

    /// Apply `LEIXING_*` environment variables on top of this config
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(
        mut self,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(limit) = lookup("LEIXING_CONCURRENCY").and_then(|v| v.trim().parse().ok()) {
            self.concurrency_limit = std::cmp::max(limit, 1);
        }
        if let Some(compile) = lookup("LEIXING_COMPILE").and_then(|v| parse_flag(&v)) {
            self.compile = compile;
        }
        if let Some(warnings) = lookup("LEIXING_WARNINGS").and_then(|v| parse_flag(&v)) {
            self.warnings = warnings;
        }
        if let Some(level) = lookup("LEIXING_LOG").and_then(|v| v.parse().ok()) {
            self.log_level = level;
        }
        self
    }

    /// Number of worker threads actually used for `task_count` tasks
    pub fn effective_workers(
        &self,
        task_count: usize,
    ) -> usize {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        self.concurrency_limit.min(cpus).min(task_count).max(1)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load a checker configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> Result<CheckerConfig, ConfigError> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_config(&content)
}

/// Parse a checker configuration from TOML text
pub fn parse_config(content: &str) -> Result<CheckerConfig, ConfigError> {
    let config: CheckerConfig = toml::from_str(content)?;
    if config.concurrency_limit == 0 {
        return Err(ConfigError::InvalidValue {
            key: "concurrency_limit",
            message: "must be at least 1".to_string(),
        });
    }
    Ok(config)
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Invalid value for `{key}`: {message}")]
    InvalidValue {
        key: &'static str,
        message: String,
    },
}
