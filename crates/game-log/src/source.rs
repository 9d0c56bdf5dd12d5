//! Incremental line reader over a growing log file.
//!
//! The client appends to `Game.log` while it runs and truncates it on every
//! launch. [`LineSource`] reads whatever has been appended since the last
//! call and reopens from the start when the file shrinks.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Errors from the line source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Yields complete, decoded lines from a file that keeps growing.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD. A trailing line
/// without its newline is held back until the newline arrives.
#[derive(Debug)]
pub struct LineSource {
    path: PathBuf,
    reader: BufReader<File>,
    /// Byte offset of the next unread byte.
    position: u64,
    /// File size at the last poll.
    last_size: u64,
    /// Bytes of an unterminated trailing line.
    pending: Vec<u8>,
    ready: VecDeque<String>,
}

impl LineSource {
    /// Opens `path` positioned at the start of the file.
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = open_file(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            position: 0,
            last_size: 0,
            pending: Vec::new(),
            ready: VecDeque::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every complete line currently in the file.
    ///
    /// Intended for the one-time replay at startup; subsequent lines come
    /// from [`poll_next`](Self::poll_next).
    pub fn read_backlog(&mut self) -> Result<Vec<String>, SourceError> {
        self.check_truncation()?;
        self.fill()?;
        let lines: Vec<String> = self.ready.drain(..).collect();
        tracing::debug!(
            path = %self.path.display(),
            lines = lines.len(),
            bytes = self.position,
            "read log backlog"
        );
        Ok(lines)
    }

    /// Returns the next complete line, or `None` when nothing new is
    /// available yet. Never blocks.
    pub fn poll_next(&mut self) -> Result<Option<String>, SourceError> {
        if let Some(line) = self.ready.pop_front() {
            return Ok(Some(line));
        }

        self.check_truncation()?;
        self.fill()?;
        Ok(self.ready.pop_front())
    }

    /// Reopens from offset 0 when the file has shrunk since the last look.
    fn check_truncation(&mut self) -> Result<(), SourceError> {
        let size = std::fs::metadata(&self.path)?.len();
        if size < self.last_size || size < self.position {
            tracing::info!(
                path = %self.path.display(),
                old_size = self.last_size,
                new_size = size,
                "log file shrank, reopening from start"
            );
            self.reader = BufReader::new(open_file(&self.path)?);
            self.reader.seek(SeekFrom::Start(0))?;
            self.position = 0;
            self.pending.clear();
        }
        self.last_size = size;
        Ok(())
    }

    /// Reads to EOF, queueing every complete line.
    fn fill(&mut self) -> Result<(), SourceError> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let n = self.reader.read_until(b'\n', &mut buf)?;
            if n == 0 {
                break;
            }
            self.position += n as u64;

            if buf.last() != Some(&b'\n') {
                self.pending.extend_from_slice(&buf);
                break;
            }

            let bytes = if self.pending.is_empty() {
                std::mem::take(&mut buf)
            } else {
                let mut joined = std::mem::take(&mut self.pending);
                joined.extend_from_slice(&buf);
                joined
            };
            let text = String::from_utf8_lossy(&bytes);
            let line = text.trim_end_matches(['\n', '\r']);
            if !line.is_empty() {
                self.ready.push_back(line.to_string());
            }
        }
        Ok(())
    }
}

fn open_file(path: &Path) -> Result<File, SourceError> {
    File::open(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })
}
