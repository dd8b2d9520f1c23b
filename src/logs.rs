use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, TermLogger, TerminalMode,
    WriteLogger,
};
use std::path::Path;

/// Logs to `<cache_dir>/logs/main.log` (rotated, last 3 files kept) and
/// mirrors warnings and errors to stderr.
pub fn init(cache_dir: &str) -> Result<()> {
    let log_dir = Path::new(cache_dir).join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let path = log_dir.join("main.log");
    let log = FileRotate::new(
        path,
        AppendTimestamp::default(FileLimit::MaxFiles(3)),
        ContentLimit::Lines(1000),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    CombinedLogger::init(vec![
        WriteLogger::new(LevelFilter::Info, config.clone(), log),
        TermLogger::new(
            LevelFilter::Warn,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
    ])?;
    info!("logging initialized");
    Ok(())
}
