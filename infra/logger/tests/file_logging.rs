use depot_logger::{LevelFilter, Logger, LoggerError};
use std::fs;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn file_logging_creates_log_file_and_blocks_second_init() -> Result<(), Box<dyn std::error::Error>> {
    let tmp_dir = tempdir()?;
    let log_dir = tmp_dir.path().join("logs");

    let logger = Logger::builder()
        .name("integration-file-logging")
        .console(false)
        .path(&log_dir)
        .level(LevelFilter::INFO)
        .init()?;
    assert!(logger.has_file_output());

    let err = Logger::builder()
        .name("integration-file-logging-second")
        .init()
        .expect_err("second init should fail");
    assert!(matches!(err, LoggerError::Subscriber { .. }));

    tracing::info!(request_id = "req-1", "hello from integration test");

    std::thread::sleep(Duration::from_millis(30));
    drop(logger);

    let log_file = fs::read_dir(&log_dir)?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.extension().and_then(|ext| ext.to_str()) == Some("log"))
        .expect("log file should be created");

    assert!(fs::metadata(&log_file)?.len() > 0, "log file should not be empty");
    Ok(())
}
