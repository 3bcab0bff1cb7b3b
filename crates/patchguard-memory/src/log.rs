//! Append-only learning log (`learnings.jsonl`).
//!
//! Each line is one sealed [`LogEntry`]. Appends write the full line
//! including its terminating newline and then `fsync`, so a crash can only
//! ever leave a torn *last* line. [`LearningLog::open`] runs a recovery pass
//! that truncates such a tail; damage anywhere earlier is reported as
//! [`MemoryError::Corrupt`] and never repaired silently. A failed append
//! truncates its own partial bytes before returning, so the next line
//! always starts on a record boundary.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::MemoryError;
use crate::record::{LogEntry, MemoryRecord};
use crate::Result;

/// What the recovery pass found when the log was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryReport {
    /// Intact records kept.
    pub records: usize,
    /// Bytes of torn tail removed (0 for a clean log).
    pub discarded_bytes: u64,
}

impl RecoveryReport {
    pub fn was_clean(&self) -> bool {
        self.discarded_bytes == 0
    }
}

/// Handle to an on-disk learning log.
#[derive(Debug)]
pub struct LearningLog {
    path: PathBuf,
    file: File,
    next_seq: u64,
    /// File length covering only complete records.
    committed_len: u64,
    #[cfg(test)]
    fail_after: Option<usize>,
}

struct Scan {
    entries: Vec<LogEntry>,
    good_len: u64,
    torn_tail: bool,
}

impl LearningLog {
    /// Open (or create) the log at `path`, discarding a torn trailing record.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, RecoveryReport)> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if !path.exists() {
            File::create(&path)?.sync_all()?;
        }

        let bytes = fs::read(&path)?;
        let scan = scan(&bytes)?;
        let mut report = RecoveryReport {
            records: scan.entries.len(),
            discarded_bytes: 0,
        };

        if scan.torn_tail {
            report.discarded_bytes = bytes.len() as u64 - scan.good_len;
            warn!(
                path = %path.display(),
                discarded_bytes = report.discarded_bytes,
                "truncating torn tail of learning log"
            );
            let f = OpenOptions::new().write(true).open(&path)?;
            f.set_len(scan.good_len)?;
            f.sync_all()?;
        }

        let file = OpenOptions::new().append(true).open(&path)?;
        let committed_len = file.metadata()?.len();
        let next_seq = scan.entries.last().map(|e| e.seq + 1).unwrap_or(1);
        debug!(path = %path.display(), records = report.records, "learning log opened");

        Ok((
            Self {
                path,
                file,
                next_seq,
                committed_len,
                #[cfg(test)]
                fail_after: None,
            },
            report,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record durably and return the sealed entry.
    pub fn append(&mut self, record: MemoryRecord) -> Result<LogEntry> {
        let entry = LogEntry::seal(self.next_seq, record)?;
        let mut line = serde_json::to_vec(&entry)?;
        line.push(b'\n');

        // A previous rewind may itself have failed.
        if self.file.metadata()?.len() != self.committed_len {
            self.truncate_to_committed()?;
        }

        if let Err(e) = self.write_line(&line) {
            if let Err(rewind) = self.truncate_to_committed() {
                warn!(
                    path = %self.path.display(),
                    error = %rewind,
                    "failed to remove partial record; retrying on next append"
                );
            }
            return Err(e.into());
        }

        self.committed_len += line.len() as u64;
        self.next_seq += 1;
        Ok(entry)
    }

    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        #[cfg(test)]
        if let Some(n) = self.fail_after.take() {
            self.file.write_all(&line[..n.min(line.len())])?;
            return Err(io::Error::other("injected write failure"));
        }
        self.file.write_all(line)?;
        self.file.sync_data()
    }

    fn truncate_to_committed(&self) -> io::Result<()> {
        self.file.set_len(self.committed_len)?;
        self.file.sync_data()
    }

    /// Make the next append write `n` bytes and then fail.
    #[cfg(test)]
    fn fail_next_append_after(&mut self, n: usize) {
        self.fail_after = Some(n);
    }

    /// All records in insertion order, read back from disk.
    pub fn read_all(&self) -> Result<Vec<MemoryRecord>> {
        let bytes = fs::read(&self.path)?;
        let scan = scan(&bytes)?;
        if scan.torn_tail {
            // Only reachable if something outside this handle wrote to the file.
            return Err(MemoryError::Corrupt {
                line: scan.entries.len() + 1,
                reason: "unterminated record appeared after open".to_string(),
            });
        }
        Ok(scan.entries.into_iter().map(|e| e.record).collect())
    }

    /// Number of records currently in the log.
    pub fn len(&self) -> usize {
        (self.next_seq - 1) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn scan(bytes: &[u8]) -> Result<Scan> {
    let mut entries = Vec::new();
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < bytes.len() {
        line_no += 1;
        let rest = &bytes[offset..];
        let Some(nl) = rest.iter().position(|b| *b == b'\n') else {
            // No terminator: the append that wrote this never finished.
            return Ok(Scan {
                entries,
                good_len: offset as u64,
                torn_tail: true,
            });
        };

        let line_end = offset + nl + 1;
        let is_last = line_end == bytes.len();
        let expected_seq = entries.len() as u64 + 1;

        match parse_line(&rest[..nl], expected_seq) {
            Ok(entry) => entries.push(entry),
            Err(reason) if is_last => {
                debug!(line = line_no, %reason, "discarding unreadable final record");
                return Ok(Scan {
                    entries,
                    good_len: offset as u64,
                    torn_tail: true,
                });
            }
            Err(reason) => {
                return Err(MemoryError::Corrupt {
                    line: line_no,
                    reason,
                })
            }
        }
        offset = line_end;
    }

    Ok(Scan {
        entries,
        good_len: offset as u64,
        torn_tail: false,
    })
}

fn parse_line(line: &[u8], expected_seq: u64) -> std::result::Result<LogEntry, String> {
    let entry: LogEntry = serde_json::from_slice(line).map_err(|e| e.to_string())?;
    if entry.seq != expected_seq {
        return Err(format!(
            "sequence gap: expected {expected_seq}, found {}",
            entry.seq
        ));
    }
    if !entry.verify() {
        return Err("record digest mismatch".to_string());
    }
    Ok(entry)
}
