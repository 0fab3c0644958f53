//! Integration tests: checker configuration files

use std::fs;

use leixing::util::config::{load_config, parse_config, CheckerConfig, ConfigError};
use leixing::util::logger::LogLevel;
use leixing::Checker;
use tempfile::TempDir;

#[test]
fn test_load_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("leixing.toml");
    fs::write(
        &path,
        "concurrency_limit = 2\ncompile = true\nwarnings = false\nlog_level = \"debug\"\n",
    )
    .unwrap();

    let config = load_config(&path).unwrap();
    assert_eq!(config.concurrency_limit, 2);
    assert!(config.compile);
    assert!(!config.warnings);
    assert_eq!(config.log_level, LogLevel::Debug);

    let checker = Checker::new(config.clone());
    assert_eq!(checker.config(), &config);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = load_config(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::IoError(_)));
}

#[test]
fn test_invalid_toml() {
    let err = parse_config("concurrency_limit = \"many\"").unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[test]
fn test_empty_file_uses_defaults() {
    assert_eq!(parse_config("").unwrap(), CheckerConfig::default());
}

#[test]
fn test_checker_with_logging_uses_configured_level() {
    let config = parse_config("log_level = \"warn\"").unwrap();
    let checker = Checker::new(config).with_logging();
    assert_eq!(checker.config().log_level, LogLevel::Warn);

    let outcome = checker.check("main.lx", Vec::new());
    assert!(outcome.is_ok());
    // 全局订阅者已经安装
    assert!(!checker.config().init_logging());
}
