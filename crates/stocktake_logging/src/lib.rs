//! Logging setup for stocktake binaries.
//!
//! Two sinks: a size-rotated file under the log directory that always gets
//! the full filter, and stderr, which only shows warnings unless verbose.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "stocktake=info,stocktake_db=info";
const MAX_LOG_FILES: usize = 5;
const MAX_LOG_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub log_dir: PathBuf,
    /// Mirror the file filter on stderr instead of warnings only
    pub verbose: bool,
}

/// Initialize tracing with a rolling file writer and stderr output.
///
/// If the log directory cannot be created, logging continues on stderr only
/// and the error is returned after the subscriber is installed.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let console_filter = if config.verbose {
        file_filter.clone()
    } else {
        EnvFilter::new("warn")
    };

    let file_writer = SharedRollingWriter::new(&config.log_dir, config.app_name);
    let file_layer = file_writer.as_ref().ok().map(|writer| {
        tracing_subscriber::fmt::layer()
            .with_writer(writer.clone())
            .with_ansi(false)
            .with_filter(file_filter)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    file_writer.map(|_| ())
}

struct RollingFileAppender {
    dir: PathBuf,
    base_name: String,
    max_files: usize,
    max_size: u64,
    file: Option<File>,
    current_size: u64,
}

impl RollingFileAppender {
    fn new(dir: PathBuf, base_name: &str, max_files: usize, max_size: u64) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        let mut appender = Self {
            dir,
            base_name: sanitize_name(base_name),
            max_files: max_files.max(1),
            max_size,
            file: None,
            current_size: 0,
        };
        let (file, size) = appender.open_current_file()?;
        appender.file = Some(file);
        appender.current_size = size;
        if appender.current_size > appender.max_size {
            appender.rotate()?;
        }
        Ok(appender)
    }

    fn open_current_file(&self) -> io::Result<(File, u64)> {
        let path = self.current_path();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let size = file.metadata()?.len();
        Ok((file, size))
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.base_name))
    }

    fn rotated_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}.log.{}", self.base_name, index))
    }

    fn rotate(&mut self) -> io::Result<()> {
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        self.shift_rotated()?;

        let (file, size) = self.open_current_file()?;
        self.file = Some(file);
        self.current_size = size;
        Ok(())
    }

    /// `app.log.N-1` → `app.log.N` ... `app.log` → `app.log.1`; the oldest is dropped.
    fn shift_rotated(&self) -> io::Result<()> {
        let max_index = self.max_files.saturating_sub(1);
        if max_index == 0 {
            // Single-file mode: truncate in place
            return fs::remove_file(self.current_path()).or_else(ignore_missing);
        }

        fs::remove_file(self.rotated_path(max_index)).or_else(ignore_missing)?;

        for idx in (1..max_index).rev() {
            let src = self.rotated_path(idx);
            if src.exists() {
                fs::rename(&src, self.rotated_path(idx + 1))?;
            }
        }

        let current = self.current_path();
        if current.exists() {
            fs::rename(current, self.rotated_path(1))?;
        }
        Ok(())
    }
}

fn ignore_missing(err: io::Error) -> io::Result<()> {
    if err.kind() == io::ErrorKind::NotFound {
        Ok(())
    } else {
        Err(err)
    }
}

impl Write for RollingFileAppender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.current_size > 0 && self.current_size + buf.len() as u64 > self.max_size {
            self.rotate()?;
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))?;
        let bytes = file.write(buf)?;
        self.current_size += bytes as u64;
        Ok(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct SharedRollingWriter {
    inner: Arc<Mutex<RollingFileAppender>>,
}

impl SharedRollingWriter {
    fn new(dir: &Path, base_name: &str) -> Result<Self> {
        let appender =
            RollingFileAppender::new(dir.to_path_buf(), base_name, MAX_LOG_FILES, MAX_LOG_FILE_SIZE)
                .with_context(|| format!("Failed to open log file in {}", dir.display()))?;
        Ok(Self {
            inner: Arc::new(Mutex::new(appender)),
        })
    }
}

struct SharedRollingWriterGuard {
    inner: Arc<Mutex<RollingFileAppender>>,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedRollingWriter {
    type Writer = SharedRollingWriterGuard;

    fn make_writer(&'a self) -> Self::Writer {
        SharedRollingWriterGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Write for SharedRollingWriterGuard {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log writer lock poisoned"))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| io::Error::other("log writer lock poisoned"))?;
        guard.flush()
    }
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("stock take/cli"), "stock_take_cli");
        assert_eq!(sanitize_name("stocktake-cli_2"), "stocktake-cli_2");
    }

    #[test]
    fn test_rotates_when_full() {
        let temp = TempDir::new().unwrap();
        let mut appender =
            RollingFileAppender::new(temp.path().to_path_buf(), "stocktake", 3, 16).unwrap();

        appender.write_all(b"0123456789\n").unwrap();
        appender.write_all(b"abcdefghij\n").unwrap();
        appender.write_all(b"ABCDEFGHIJ\n").unwrap();
        appender.flush().unwrap();

        let current = fs::read_to_string(temp.path().join("stocktake.log")).unwrap();
        assert_eq!(current, "ABCDEFGHIJ\n");
        let first = fs::read_to_string(temp.path().join("stocktake.log.1")).unwrap();
        assert_eq!(first, "abcdefghij\n");
        let second = fs::read_to_string(temp.path().join("stocktake.log.2")).unwrap();
        assert_eq!(second, "0123456789\n");
        assert!(!temp.path().join("stocktake.log.3").exists());
    }

    #[test]
    fn test_appends_to_existing_file() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("stocktake.log"), "old\n").unwrap();
        let mut appender =
            RollingFileAppender::new(temp.path().to_path_buf(), "stocktake", 3, 1024).unwrap();
        appender.write_all(b"new\n").unwrap();
        appender.flush().unwrap();
        assert_eq!(
            fs::read_to_string(temp.path().join("stocktake.log")).unwrap(),
            "old\nnew\n"
        );
    }
}
