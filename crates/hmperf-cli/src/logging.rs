use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "hmperf.log";

/// `<cache_dir>/hmperf/hmperf.log`, if the directory can be created.
fn log_file_path() -> Option<PathBuf> {
    let dir = dirs::cache_dir()?.join("hmperf");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir.join(LOG_FILE_NAME))
}

const fn console_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Colored stderr at a verbosity-dependent level,
/// plus a plain `debug` log file when the cache dir is writable.
pub fn setup_logger(verbosity: u8) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .debug(Color::Cyan);

    let console = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} {:5} {}",
                chrono::Local::now().format("%H:%M:%S"),
                colors.color(record.level()),
                message
            ));
        })
        .level(console_level(verbosity))
        .chain(std::io::stderr());

    let mut root = fern::Dispatch::new()
        .level(LevelFilter::Debug)
        .level_for("ureq", LevelFilter::Warn)
        .level_for("ureq_proto", LevelFilter::Warn)
        .level_for("adb_client", LevelFilter::Warn)
        .chain(console);

    if let Some(path) = log_file_path() {
        let file = fern::Dispatch::new()
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{} {:5} [{}:{}] {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.file().unwrap_or("?"),
                    record.line().unwrap_or_default(),
                    message
                ));
            })
            .chain(fern::log_file(path)?);
        root = root.chain(file);
    }

    root.apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(console_level(0), LevelFilter::Warn);
        assert_eq!(console_level(1), LevelFilter::Info);
        assert_eq!(console_level(5), LevelFilter::Debug);
    }
}
