use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use time::{Date, OffsetDateTime};

use crate::error::{Error, Result};

/// Append-only byte sink with size-based rotation and date-based naming.
///
/// Files are `YYYY-MM-DD_N.log` in the configured directory, `N` starting at
/// 1 per day and incrementing on rotation. On creation the directory is
/// scanned for today's files and `N` becomes one greater than the largest
/// existing counter, so a restart never appends to an old stream.
///
/// A failed rotation open moves the sink into a closed state where writes
/// fail fast; a failed write is reported to the caller and not retried.
pub struct FileSink {
    dir: PathBuf,
    max_file_size: u64,
    date: Date,
    counter: u32,
    file: Option<File>,
    written: u64,
}

impl FileSink {
    pub fn open(dir: impl AsRef<Path>, max_file_size: u64) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let date = today()?;
        let counter = max_counter_for(&dir, date)?.map_or(1, |n| n + 1);

        let mut sink = Self {
            dir,
            max_file_size,
            date,
            counter,
            file: None,
            written: 0,
        };
        sink.open_current()?;
        Ok(sink)
    }

    /// Append `bytes` to the current file, rotating first when the size
    /// ceiling would be crossed or the calendar date has changed.
    pub fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        if self.file.is_none() {
            return Err(Error::SinkClosed);
        }

        let date = today()?;
        if date != self.date {
            self.date = date;
            self.counter = 1;
            self.open_current()?;
        } else if self.written + bytes.len() as u64 > self.max_file_size && self.written > 0 {
            self.counter += 1;
            self.open_current()?;
        }

        let file = self.file.as_mut().ok_or(Error::SinkClosed)?;
        file.write_all(bytes)?;
        self.written += bytes.len() as u64;
        Ok(())
    }

    /// Request a data-sync of the current file (data pages only).
    pub fn flush(&mut self) -> Result<()> {
        if let Some(file) = &self.file {
            file.sync_data()?;
        }
        Ok(())
    }

    pub fn current_file_size(&self) -> u64 {
        self.written
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open_current(&mut self) -> Result<()> {
        self.file = None;
        self.written = 0;
        let path = self.dir.join(file_name(self.date, self.counter));
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.file = Some(file);
        Ok(())
    }
}

fn file_name(date: Date, counter: u32) -> String {
    format!(
        "{:04}-{:02}-{:02}_{}.log",
        date.year(),
        u8::from(date.month()),
        date.day(),
        counter
    )
}

fn today() -> Result<Date> {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| Error::TimeOutOfRange("system time before UNIX epoch"))?
        .as_secs();
    let moment = OffsetDateTime::from_unix_timestamp(seconds as i64)
        .map_err(|_| Error::TimeOutOfRange("system time exceeds calendar range"))?;
    Ok(moment.date())
}

/// Largest `N` among today's `YYYY-MM-DD_N.log` files, scanning the
/// directory the same way segment stores discover their next id.
fn max_counter_for(dir: &Path, date: Date) -> Result<Option<u32>> {
    let prefix = format!(
        "{:04}-{:02}-{:02}_",
        date.year(),
        u8::from(date.month()),
        date.day()
    );

    let mut max: Option<u32> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let name = entry.file_name();
        let name = match name.to_str() {
            Some(name) => name,
            None => continue,
        };
        let base = match name.strip_prefix(&prefix).and_then(|rest| rest.strip_suffix(".log")) {
            Some(base) => base,
            None => continue,
        };
        if let Ok(n) = base.parse::<u32>() {
            max = Some(max.map_or(n, |cur| cur.max(n)));
        }
    }

    Ok(max)
}
