use super::*;
use tempfile::TempDir;

#[test]
fn test_log_level_from_str() {
    assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
    assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
    assert_eq!("info".parse::<LogLevel>().unwrap(), LogLevel::Info);
    assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warn);
    assert_eq!("error".parse::<LogLevel>().unwrap(), LogLevel::Error);
}

#[test]
fn test_log_level_from_str_warning() {
    assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
}

#[test]
fn test_log_level_from_str_case_insensitive() {
    assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
}

#[test]
fn test_log_level_from_str_invalid() {
    assert!(matches!(
        "verbose".parse::<LogLevel>(),
        Err(TelemetryError::Logging(_))
    ));
}

#[test]
fn test_log_level_to_tracing() {
    assert_eq!(LogLevel::Trace.to_tracing_level(), Level::TRACE);
    assert_eq!(LogLevel::Debug.to_tracing_level(), Level::DEBUG);
    assert_eq!(LogLevel::Info.to_tracing_level(), Level::INFO);
    assert_eq!(LogLevel::Warn.to_tracing_level(), Level::WARN);
    assert_eq!(LogLevel::Error.to_tracing_level(), Level::ERROR);
}

#[test]
fn test_log_level_display_roundtrip() {
    for level in [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ] {
        assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
    }
}

#[test]
fn test_log_level_ordering() {
    assert!(LogLevel::Trace < LogLevel::Debug);
    assert!(LogLevel::Debug < LogLevel::Info);
    assert!(LogLevel::Info < LogLevel::Warn);
    assert!(LogLevel::Warn < LogLevel::Error);
}

#[test]
fn test_log_config_default() {
    let config = LogConfig::default();
    assert_eq!(config.level, LogLevel::Info);
    assert_eq!(config.format, LogFormat::Pretty);
    assert_eq!(config.output, LogOutput::Stderr);
    assert!(config.include_target);
    assert!(!config.include_file_line);
    assert!(!config.include_thread_id);
}

#[test]
fn test_log_config_builder() {
    let config = LogConfig::default()
        .with_level(LogLevel::Trace)
        .with_format(LogFormat::Compact)
        .with_output(LogOutput::Stdout)
        .with_target(false)
        .with_file_line(true)
        .with_thread_id(true);

    assert_eq!(config.level, LogLevel::Trace);
    assert_eq!(config.format, LogFormat::Compact);
    assert_eq!(config.output, LogOutput::Stdout);
    assert!(!config.include_target);
    assert!(config.include_file_line);
    assert!(config.include_thread_id);
}

#[test]
fn test_log_config_serde() {
    let config = LogConfig::default()
        .with_format(LogFormat::Json)
        .with_output(LogOutput::File(PathBuf::from("/var/log/strata.log")));
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["level"], "info");
    assert_eq!(json["format"], "json");
    assert_eq!(json["output"]["file"], "/var/log/strata.log");

    let back: LogConfig = serde_json::from_value(json).unwrap();
    assert_eq!(back, config);
}

// Only one global subscriber can exist per test binary, so every
// init_logging assertion lives in this one test.
#[test]
fn test_init_logging_to_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("strata.log");
    let config = LogConfig::default()
        .with_level(LogLevel::Debug)
        .with_format(LogFormat::Json)
        .with_output(LogOutput::File(path.clone()));

    init_logging(&config).unwrap();
    tracing::info!(samples = 16, "loader finished");
    assert!(path.exists());

    let second = init_logging(&LogConfig::default());
    assert!(matches!(second, Err(TelemetryError::Init(_))));
}
