use std::fmt;

use crate::sink::FileSink;

/// Free-space threshold below which the buffer grows or drains.
const PRESSURE_RESERVE: usize = 256;
const PAGE_SIZE: usize = 4096;

/// Single-writer byte ring where the consumer stages formatted text before
/// it reaches the sink.
///
/// Two pressure modes, selected by which `writer` constructor is used:
/// grow-on-pressure (no sink attached; capacity doubles and data is copied)
/// and flush-on-pressure (everything buffered drains to the attached sink
/// and the ring resets to empty).
pub struct FormatBuffer {
    data: Box<[u8]>,
    read: usize,
    write: usize,
}

impl FormatBuffer {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        let capacity = initial_capacity.max(PRESSURE_RESERVE * 2);
        let mut data = vec![0u8; capacity].into_boxed_slice();
        let mut offset = 0;
        while offset < data.len() {
            data[offset] = 0;
            offset += PAGE_SIZE;
        }

        Self {
            data,
            read: 0,
            write: 0,
        }
    }

    pub fn len(&self) -> usize {
        if self.write >= self.read {
            self.write - self.read
        } else {
            self.data.len() - self.read + self.write
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    fn free_space(&self) -> usize {
        // One byte is kept unused to distinguish full from empty.
        self.data.len() - self.len() - 1
    }

    /// Acquire a grow-on-pressure writer.
    pub fn writer(&mut self) -> LineWriter<'_> {
        if self.free_space() < PRESSURE_RESERVE {
            self.grow(PRESSURE_RESERVE);
        }
        LineWriter {
            buf: self,
            sink: None,
        }
    }

    /// Acquire a flush-on-pressure writer that drains to `sink` when space
    /// runs low.
    pub fn writer_with_sink<'a>(&'a mut self, sink: &'a mut FileSink) -> LineWriter<'a> {
        if self.free_space() < PRESSURE_RESERVE {
            drain(self, sink);
        }
        LineWriter {
            buf: self,
            sink: Some(sink),
        }
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        let capacity = self.data.len();
        let first = bytes.len().min(capacity - self.write);
        self.data[self.write..self.write + first].copy_from_slice(&bytes[..first]);
        if first < bytes.len() {
            let rest = bytes.len() - first;
            self.data[..rest].copy_from_slice(&bytes[first..]);
            self.write = rest;
        } else {
            self.write = (self.write + first) % capacity;
        }
    }

    fn grow(&mut self, min_additional: usize) {
        let used = self.len();
        let mut new_capacity = self.data.len() * 2;
        while new_capacity - self.data.len() < min_additional {
            new_capacity *= 2;
        }

        let mut grown = vec![0u8; new_capacity].into_boxed_slice();
        if self.write >= self.read {
            grown[..used].copy_from_slice(&self.data[self.read..self.write]);
        } else {
            let first = self.data.len() - self.read;
            grown[..first].copy_from_slice(&self.data[self.read..]);
            grown[first..used].copy_from_slice(&self.data[..self.write]);
        }

        self.data = grown;
        self.read = 0;
        self.write = used;
    }

    /// Write all buffered bytes to `sink` and reset the ring to empty.
    pub fn drain_to(&mut self, sink: &mut FileSink) -> crate::Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let result = if self.write >= self.read {
            sink.write(&self.data[self.read..self.write])
        } else {
            sink.write(&self.data[self.read..])
                .and_then(|()| sink.write(&self.data[..self.write]))
        };

        self.read = 0;
        self.write = 0;
        result
    }

    /// Copy out up to `out.len()` buffered bytes. Used in grow mode.
    pub fn read_into(&mut self, out: &mut [u8]) -> usize {
        let count = self.len().min(out.len());
        for slot in out.iter_mut().take(count) {
            *slot = self.data[self.read];
            self.read = (self.read + 1) % self.data.len();
        }
        count
    }
}

fn drain(buf: &mut FormatBuffer, sink: &mut FileSink) {
    if let Err(err) = buf.drain_to(sink) {
        // Records are considered committed once staged; an I/O failure is
        // reported out-of-band and not retried.
        log::warn!("flashlog sink write failed: {err}");
    }
}

/// Writer handle for in-place line construction.
///
/// Implements `std::fmt::Write`, which is the adaptor the formatting
/// machinery writes through; no intermediate formatted `String` exists.
pub struct LineWriter<'a> {
    buf: &'a mut FormatBuffer,
    sink: Option<&'a mut FileSink>,
}

impl LineWriter<'_> {
    fn ensure(&mut self, len: usize) {
        if self.buf.free_space() >= len {
            return;
        }
        match self.sink.as_deref_mut() {
            Some(sink) => {
                drain(self.buf, sink);
                if self.buf.free_space() < len {
                    // A single write larger than the whole ring still needs
                    // room after the drain.
                    self.buf.grow(len);
                }
            }
            None => self.buf.grow(len),
        }
    }

    pub fn push_byte(&mut self, byte: u8) {
        self.ensure(1);
        self.buf.push_bytes(std::slice::from_ref(&byte));
    }

    pub fn push_slice(&mut self, bytes: &[u8]) {
        self.ensure(bytes.len());
        self.buf.push_bytes(bytes);
    }
}

impl fmt::Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.push_slice(s.as_bytes());
        Ok(())
    }

    fn write_char(&mut self, c: char) -> fmt::Result {
        let mut utf8 = [0u8; 4];
        self.push_slice(c.encode_utf8(&mut utf8).as_bytes());
        Ok(())
    }
}
