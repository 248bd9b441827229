// tests/logging.rs

use procvisor::cli::LogLevel;
use procvisor::logging::log_filter;
use tracing_subscriber::filter::LevelFilter;

#[test]
fn env_directives_can_target_one_module() -> anyhow::Result<()> {
    let filter = log_filter(None, Some("warn,procvisor::supervisor=debug"))?;

    assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    assert!(filter.to_string().contains("procvisor::supervisor=debug"));
    Ok(())
}

#[test]
fn cli_level_wins_over_env() -> anyhow::Result<()> {
    let filter = log_filter(Some(LogLevel::Warn), Some("procvisor=trace"))?;

    assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    Ok(())
}

#[test]
fn unset_or_blank_env_defaults_to_info() -> anyhow::Result<()> {
    assert_eq!(log_filter(None, None)?.max_level_hint(), Some(LevelFilter::INFO));
    assert_eq!(log_filter(None, Some("  "))?.max_level_hint(), Some(LevelFilter::INFO));
    Ok(())
}

#[test]
fn malformed_env_is_rejected() {
    let err = log_filter(None, Some("procvisor=loud")).unwrap_err();
    assert!(err.to_string().contains("PROCVISOR_LOG"), "{err}");
}
