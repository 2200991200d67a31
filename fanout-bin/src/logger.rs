use std::fs::{File, OpenOptions};
use std::io::{self, Stderr, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use slog::{Drain, Record};
use slog_async::AsyncGuard;

use fanout_conf::{Settings, To};

pub use slog::Logger;

/// Routes the `log` facade into an async slog drain, the guard flushes it on drop.
pub fn logger_init(settings: &Settings) -> Result<AsyncGuard> {
    let (logger, guard) = config_logger(settings.log.path(), settings.log.to, settings.log.level);
    log::set_boxed_logger(Box::new(LoggerEx(logger)))?;
    log::set_max_level(slog_log_to_level(settings.log.level).to_level_filter());
    Ok(guard)
}

struct LoggerEx(Logger);

impl log::Log for LoggerEx {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, r: &log::Record) {
        let level = log_to_slog_level(r.metadata().level());
        let args = r.args();
        let target = r.target();
        let location = &record_as_location(r);
        let s = slog::RecordStatic { location, level, tag: target };

        self.0.log(&Record::new(&s, args, slog::b!()))
    }

    fn flush(&self) {}
}

fn log_to_slog_level(level: log::Level) -> slog::Level {
    match level {
        log::Level::Trace => slog::Level::Trace,
        log::Level::Debug => slog::Level::Debug,
        log::Level::Info => slog::Level::Info,
        log::Level::Warn => slog::Level::Warning,
        log::Level::Error => slog::Level::Error,
    }
}

fn slog_log_to_level(level: slog::Level) -> log::Level {
    match level {
        slog::Level::Trace => log::Level::Trace,
        slog::Level::Debug => log::Level::Debug,
        slog::Level::Info => log::Level::Info,
        slog::Level::Warning => log::Level::Warn,
        slog::Level::Error => log::Level::Error,
        slog::Level::Critical => log::Level::Error,
    }
}

fn record_as_location(r: &log::Record) -> slog::RecordLocation {
    let module = r.module_path_static().unwrap_or("<unknown>");
    let file = r.file_static().unwrap_or("<unknown>");
    let line = r.line().unwrap_or_default();

    slog::RecordLocation { file, line, column: 0, function: "", module }
}

fn timestamp_local(io: &mut dyn io::Write) -> io::Result<()> {
    write!(io, "{}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"))
}

pub fn config_logger(path: Option<PathBuf>, to: To, level: slog::Level) -> (Logger, AsyncGuard) {
    let decorator = slog_term::PlainDecorator::new(WriteFilter::new(path, to));
    let drain = slog_term::FullFormat::new(decorator).use_custom_timestamp(timestamp_local).build().fuse();

    let drain = LevelFilter { drain, level }.fuse();

    let (drain, guard) = slog_async::Async::new(drain)
        .chan_size(4096)
        .overflow_strategy(slog_async::OverflowStrategy::DropAndReport)
        .build_with_guard();

    (Logger::root(drain.fuse(), slog::o!()), guard)
}

struct LevelFilter<D> {
    drain: D,
    level: slog::Level,
}

impl<D> Drain for LevelFilter<D>
where
    D: Drain,
{
    type Ok = Option<D::Ok>;
    type Err = Option<D::Err>;

    fn log(&self, record: &Record, values: &slog::OwnedKVList) -> std::result::Result<Self::Ok, Self::Err> {
        if record.level().is_at_least(self.level) {
            self.drain.log(record, values).map(Some).map_err(Some)
        } else {
            Ok(None)
        }
    }
}

/// Console output goes to stderr, stdout carries the delivery lines.
struct WriteFilter {
    path: Option<PathBuf>,
    to: To,

    file: Option<File>,
    console: Stderr,
}

impl WriteFilter {
    fn new(path: Option<PathBuf>, to: To) -> Self {
        Self { path, to, file: None, console: io::stderr() }
    }

    fn file(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let Some(path) = self.path.as_ref() else {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no log file configured"));
            };
            self.file = Some(open_file(path)?);
        }
        match self.file.as_mut() {
            Some(f) => Ok(f),
            None => unreachable!(),
        }
    }
}

impl io::Write for WriteFilter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.to.console() {
            self.console.write_all(buf)?;
        }
        if self.to.file() {
            self.file()?.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.to.console() {
            self.console.flush()?;
        }
        if self.to.file() {
            self.file()?.flush()?;
        }
        Ok(())
    }
}

fn open_file(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path).map_err(|e| {
        io::Error::new(e.kind(), format!("logger file config error, path: {}, {:?}", path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_filter() {
        let mut off = WriteFilter::new(None, To::Off);
        assert_eq!(off.write(b"dropped").unwrap(), 7);
        assert!(off.flush().is_ok());
        assert!(off.file.is_none());

        let mut missing = WriteFilter::new(None, To::File);
        assert_eq!(missing.write(b"x").unwrap_err().kind(), io::ErrorKind::NotFound);

        let path = std::env::temp_dir().join(format!("fanout-logger-{}.log", std::process::id()));
        let mut file = WriteFilter::new(Some(path.clone()), To::File);
        file.write_all(b"line 1\n").unwrap();
        file.flush().unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "line 1\n");
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(slog_log_to_level(slog::Level::Critical), log::Level::Error);
        assert_eq!(log_to_slog_level(log::Level::Warn), slog::Level::Warning);
        assert_eq!(slog_log_to_level(log_to_slog_level(log::Level::Trace)), log::Level::Trace);
    }
}
