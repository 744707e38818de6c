//! Rotation-aware file tailing.
//!
//! [`LogTailer`] follows a growing log file the way `tail -F` does:
//!
//! - It attaches at end-of-file by default so a restart does not replay history
//! - Truncation (file shorter than the read offset) rewinds to the beginning
//! - Rotation (same path, different inode) drains the old handle, then
//!   reopens the new file from its first byte
//! - Transient I/O failures are retried with exponential backoff; once the
//!   retry budget is spent [`TailError::RetriesExhausted`] is returned
//! - Lines longer than [`TailerConfig::max_line_bytes`] are skipped up to the
//!   next newline without being buffered

use std::collections::VecDeque;
use std::fs::{self, File, Metadata};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

use tracing::{debug, info, warn};

use crate::error::{Result, TailError};
use crate::types::LogLine;

/// File name of the main Plex Media Server log inside its log directory.
pub const PLEX_MAIN_LOG: &str = "Plex Media Server.log";

/// Longest line the tailer will buffer, matching the classifier's limit.
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024;

/// Upper bound for the delay between two retries.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Resolves the file to follow.
///
/// Plex is usually configured with its log *directory*; in that case the
/// main server log inside it is followed. Any other path is returned as is.
#[must_use]
pub fn resolve_log_file(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_dir() {
        path.join(PLEX_MAIN_LOG)
    } else {
        path.to_path_buf()
    }
}

/// Configuration for a [`LogTailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TailerConfig {
    /// How long to sleep when no new data is available.
    pub poll_interval: Duration,
    /// Read existing content instead of attaching at end-of-file.
    pub start_at_beginning: bool,
    /// Consecutive failed polls tolerated before giving up.
    pub max_io_retries: u32,
    /// Delay before the first retry; doubled on each further failure.
    pub retry_backoff: Duration,
    /// Lines longer than this (without the terminator) are dropped.
    pub max_line_bytes: usize,
}

impl Default for TailerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            start_at_beginning: false,
            max_io_retries: 5,
            retry_backoff: Duration::from_secs(1),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
        }
    }
}

impl TailerConfig {
    /// Sets the idle poll interval.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets whether existing content is replayed on first attach.
    #[must_use]
    pub const fn from_beginning(mut self, from_beginning: bool) -> Self {
        self.start_at_beginning = from_beginning;
        self
    }

    /// Sets the retry policy for I/O failures.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_io_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }

    /// Sets the longest line that is kept.
    #[must_use]
    pub const fn with_max_line_bytes(mut self, max: usize) -> Self {
        self.max_line_bytes = max;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.retry_backoff.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

/// Identifies the file behind a path, so rotation can be told apart from growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileIdentity {
    dev: u64,
    ino: u64,
}

impl FileIdentity {
    #[cfg(unix)]
    fn of(meta: &Metadata) -> Option<Self> {
        Some(Self {
            dev: meta.dev(),
            ino: meta.ino(),
        })
    }

    // Without inodes only truncation can be detected.
    #[cfg(not(unix))]
    fn of(_meta: &Metadata) -> Option<Self> {
        None
    }
}

#[derive(Debug)]
struct OpenFile {
    reader: BufReader<File>,
    identity: Option<FileIdentity>,
}

/// Follows a single log file and yields complete lines as they are written.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    config: TailerConfig,
    file: Option<OpenFile>,
    /// Offset of the next unread byte in the current file.
    offset: u64,
    /// Bytes of a line whose newline has not been written yet.
    partial: Vec<u8>,
    /// Lines read but not yet handed out by [`LogTailer::next_line`].
    pending: VecDeque<LogLine>,
    /// Start offset of an oversized line being skipped.
    skipping_from: Option<u64>,
    /// Set when an attach failed before the first success; the file is then
    /// new to us and read from its start.
    missed_start: bool,
}

impl LogTailer {
    /// Creates a tailer for `path`. The file is opened lazily on first poll.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, config: TailerConfig) -> Self {
        Self {
            path: path.into(),
            config,
            file: None,
            offset: 0,
            partial: Vec::new(),
            pending: VecDeque::new(),
            skipping_from: None,
            missed_start: false,
        }
    }

    /// Returns the followed path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &TailerConfig {
        &self.config
    }

    /// Returns the offset of the next unread byte in the current file.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns true once a file handle is open.
    #[must_use]
    pub const fn is_attached(&self) -> bool {
        self.file.is_some()
    }

    /// Opens the file and positions the read offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a regular file.
    pub fn attach(&mut self) -> Result<()> {
        let from_start = self.config.start_at_beginning || self.missed_start;
        match self.open_at(from_start) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.missed_start = true;
                Err(err)
            }
        }
    }

    /// Reads every complete line that is currently available.
    ///
    /// Never blocks. Detects truncation and rotation before reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, stat-ed or read.
    pub fn poll(&mut self) -> Result<Vec<LogLine>> {
        let mut lines = Vec::new();

        if self.file.is_none() {
            self.attach()?;
        }

        match fs::metadata(&self.path) {
            Ok(meta) => {
                let current = self.file.as_ref().and_then(|f| f.identity);
                if current.is_some() && FileIdentity::of(&meta) != current {
                    // Whatever was appended to the old file before the rename
                    // still belongs to this stream.
                    self.read_available(&mut lines)?;
                    self.flush_partial(&mut lines);
                    info!(path = %self.path.display(), "log file rotated, reopening");
                    if let Err(err) = self.open_at(true) {
                        self.file = None;
                        self.missed_start = true;
                        if lines.is_empty() {
                            return Err(err);
                        }
                        return Ok(lines);
                    }
                } else if meta.len() < self.offset {
                    warn!(
                        path = %self.path.display(),
                        size = meta.len(),
                        offset = self.offset,
                        "log file truncated, restarting from beginning"
                    );
                    self.rewind()?;
                }
            }
            Err(err) => {
                // Path is gone, usually mid-rotation. Drain the old handle.
                self.read_available(&mut lines)?;
                if lines.is_empty() {
                    return Err(err.into());
                }
                return Ok(lines);
            }
        }

        self.read_available(&mut lines)?;
        Ok(lines)
    }

    /// Waits for and returns the next line.
    ///
    /// Each poll is a short synchronous `std::fs` read of whatever is
    /// already on disk; waiting happens only in the async sleep between
    /// polls. Sleeps for the poll interval while no data is available. I/O failures
    /// are retried with backoff; a successful poll resets the failure count.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::RetriesExhausted`] once more than
    /// `max_io_retries` consecutive polls have failed.
    pub async fn next_line(&mut self) -> Result<LogLine> {
        let mut failures = 0u32;

        loop {
            if let Some(line) = self.pending.pop_front() {
                return Ok(line);
            }

            match self.poll() {
                Ok(lines) => {
                    failures = 0;
                    if lines.is_empty() {
                        tokio::time::sleep(self.config.poll_interval).await;
                    } else {
                        self.pending.extend(lines);
                    }
                }
                Err(err) => {
                    failures += 1;
                    if failures > self.config.max_io_retries {
                        return Err(TailError::RetriesExhausted {
                            path: self.path.clone(),
                            attempts: failures,
                            source: Box::new(err),
                        });
                    }

                    let delay = self.config.backoff_for(failures);
                    warn!(
                        path = %self.path.display(),
                        error = %err,
                        attempt = failures,
                        retry_in_ms = delay.as_millis() as u64,
                        "failed to read log file, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn open_at(&mut self, from_start: bool) -> Result<()> {
        let file = File::open(&self.path)?;
        let meta = file.metadata()?;
        if !meta.is_file() {
            return Err(TailError::NotAFile(self.path.clone()));
        }

        let mut reader = BufReader::new(file);
        let offset = if from_start {
            0
        } else {
            reader.seek(SeekFrom::End(0))?
        };

        self.file = Some(OpenFile {
            reader,
            identity: FileIdentity::of(&meta),
        });
        self.offset = offset;
        self.partial.clear();
        self.skipping_from = None;
        self.missed_start = false;

        info!(path = %self.path.display(), offset, "attached to log file");
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        if let Some(open) = self.file.as_mut() {
            open.reader.seek(SeekFrom::Start(0))?;
        }
        self.offset = 0;
        self.partial.clear();
        self.skipping_from = None;
        Ok(())
    }

    fn read_available(&mut self, lines: &mut Vec<LogLine>) -> Result<()> {
        let max = self.config.max_line_bytes;
        let Some(open) = self.file.as_mut() else {
            return Ok(());
        };

        loop {
            let buf = open.reader.fill_buf()?;
            if buf.is_empty() {
                break;
            }
            let (len, complete) = match buf.iter().position(|b| *b == b'\n') {
                Some(i) => (i + 1, true),
                None => (buf.len(), false),
            };
            if self.skipping_from.is_none() {
                self.partial.extend_from_slice(&buf[..len]);
            }
            open.reader.consume(len);
            self.offset = self.offset.saturating_add(len as u64);

            if self.skipping_from.is_none() {
                let content = self.partial.len() - usize::from(complete);
                if content > max {
                    let start = self.offset.saturating_sub(self.partial.len() as u64);
                    warn!(
                        path = %self.path.display(),
                        offset = start,
                        max_line_bytes = max,
                        "skipping oversized log line"
                    );
                    self.partial.clear();
                    self.skipping_from = Some(start);
                }
            }

            if complete {
                if let Some(start) = self.skipping_from.take() {
                    debug!(offset = start, bytes = self.offset - start, "skipped oversized line");
                    continue;
                }
                let raw = std::mem::take(&mut self.partial);
                let start = self.offset.saturating_sub(raw.len() as u64);
                if let Some(line) = decode_line(&raw, start) {
                    lines.push(line);
                }
            }
        }

        if !self.partial.is_empty() {
            debug!(bytes = self.partial.len(), "holding incomplete line");
        }
        Ok(())
    }

    fn flush_partial(&mut self, lines: &mut Vec<LogLine>) {
        self.skipping_from = None;
        if self.partial.is_empty() {
            return;
        }
        let raw = std::mem::take(&mut self.partial);
        let start = self.offset.saturating_sub(raw.len() as u64);
        if let Some(line) = decode_line(&raw, start) {
            lines.push(line);
        }
    }
}

/// Decodes raw bytes into a line, dropping the line terminator.
/// Whitespace-only lines are skipped.
fn decode_line(raw: &[u8], offset: u64) -> Option<LogLine> {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim_end_matches(['\n', '\r']);
    if text.trim().is_empty() {
        return None;
    }
    Some(LogLine::new(text, offset))
}
