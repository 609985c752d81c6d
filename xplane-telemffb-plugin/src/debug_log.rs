//! File-backed debug log.
//!
//! Every `tracing` event becomes one timestamped line appended to the debug
//! log file. Failing to open or write the file is never an error: the writer
//! silently degrades to a sink.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// `MakeWriter` that appends to a shared file handle.
#[derive(Clone, Default)]
pub struct DebugLogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl DebugLogWriter {
    /// Open `path` for appending. `None`, or an open failure, gives a sink.
    pub fn open(path: Option<&Path>) -> Self {
        let file = path.and_then(|p| OpenOptions::new().create(true).append(true).open(p).ok());
        DebugLogWriter { file: file.map(|f| Arc::new(Mutex::new(f))) }
    }

    pub fn is_sink(&self) -> bool {
        self.file.is_none()
    }
}

pub enum DebugLogLine<'a> {
    File(MutexGuard<'a, File>),
    Sink(io::Sink),
}

impl Write for DebugLogLine<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            // Write errors are dropped.
            DebugLogLine::File(f) => {
                let _ = f.write_all(buf);
                Ok(buf.len())
            }
            DebugLogLine::Sink(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            DebugLogLine::File(f) => {
                let _ = f.flush();
                Ok(())
            }
            DebugLogLine::Sink(s) => s.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for DebugLogWriter {
    type Writer = DebugLogLine<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        match &self.file {
            Some(f) => DebugLogLine::File(f.lock().unwrap_or_else(PoisonError::into_inner)),
            None => DebugLogLine::Sink(io::sink()),
        }
    }
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init(path: Option<&Path>, level: LevelFilter) -> bool {
    let layer = fmt::layer()
        .with_writer(DebugLogWriter::open(path))
        .with_ansi(false)
        .with_target(false)
        .with_thread_names(true);

    tracing_subscriber::registry()
        .with(level)
        .with(layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_to_file() {
        let path = std::env::temp_dir().join(format!("telemffb-log-{}.txt", std::process::id()));
        std::fs::remove_file(&path).ok();

        let writer = DebugLogWriter::open(Some(&path));
        assert!(!writer.is_sink());
        writer.make_writer().write_all(b"first\n").unwrap();
        writer.make_writer().write_all(b"second\n").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(text, "first\nsecond\n");
    }

    #[test]
    fn unopenable_path_degrades_to_sink() {
        let writer = DebugLogWriter::open(Some(Path::new("/nonexistent-dir/telemffb/log.txt")));
        assert!(writer.is_sink());
        assert_eq!(writer.make_writer().write(b"dropped").unwrap(), 7);
    }

    #[test]
    fn disabled_log_is_a_sink() {
        assert!(DebugLogWriter::open(None).is_sink());
    }
}
