use std::fs::OpenOptions;
use std::io::Write;

/// Fire-and-forget destination for human-readable diagnostic lines.
///
/// The orchestrator reports discovery and dispatch failures here in addition
/// to structured tracing output. Best-effort: the sink must not surface
/// errors back to its caller.
pub trait LogSink: Send + Sync {
    fn set_message(&self, msg: &str);
}

/// Appends each message as a line to a file.
///
/// A sink that cannot persist its message is broken beyond recovery, so open
/// and write failures panic rather than silently dropping diagnostics.
pub struct FileSink {
    path: String,
}

impl FileSink {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl LogSink for FileSink {
    fn set_message(&self, msg: &str) {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .unwrap_or_else(|e| panic!("unable to open log file {}: {e}", self.path));
        if let Err(e) = writeln!(file, "{msg}") {
            panic!("unable to write log file {}: {e}", self.path);
        }
    }
}

/// Prints each message to stdout; the failsafe default.
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn set_message(&self, msg: &str) {
        println!("{msg}");
    }
}
