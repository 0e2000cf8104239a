use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::level;
use crate::outbuf::{FormatBuffer, LineWriter};
use crate::record::{RecordHeader, HEADER_SIZE};
use crate::registry::{self, QueueHandle};
use crate::sink::FileSink;

/// Staging-buffer flush and reclamation cadence, in loop iterations.
const FLUSH_INTERVAL: usize = 50_000;
/// How long the consumer sleeps when every queue is empty.
const IDLE_SLEEP: Duration = Duration::from_micros(100);

struct BackendState {
    running: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

static BACKEND: Mutex<Option<BackendState>> = Mutex::new(None);

/// Start the background consumer thread. A no-op if it is already running.
///
/// Applies `config` to the registry (queue geometry) and the level gate,
/// opens the sink, and spawns the consumer. Fails if the log directory or
/// its first file cannot be created.
pub fn backend_start(config: Config) -> Result<()> {
    let mut guard = BACKEND.lock().expect("backend mutex poisoned");
    if guard.is_some() {
        return Ok(());
    }

    registry::registry().configure(&config);
    level::set_min_level(config.min_level);
    let sink = FileSink::open(&config.log_dir, config.max_file_size)?;

    let running = Arc::new(AtomicBool::new(true));
    let thread = {
        let running = running.clone();
        std::thread::Builder::new()
            .name("flashlog-backend".into())
            .spawn(move || Consumer::new(&config, sink, running).run())?
    };

    *guard = Some(BackendState { running, thread });
    Ok(())
}

/// Stop the consumer: drain every queue, flush, and join. Idempotent.
pub fn backend_stop() {
    let state = BACKEND.lock().expect("backend mutex poisoned").take();
    if let Some(state) = state {
        state.running.store(false, Ordering::Release);
        let _ = state.thread.join();
    }
}

/// Number of records dropped on backpressure since start (or last reset).
pub fn backend_dropped_count() -> u64 {
    registry::registry().dropped_count()
}

pub fn backend_reset_dropped_count() {
    registry::registry().reset_dropped_count()
}

struct Consumer {
    snapshot: Vec<Arc<QueueHandle>>,
    outbuf: FormatBuffer,
    sink: FileSink,
    running: Arc<AtomicBool>,
    cpu_affinity: Option<usize>,
}

impl Consumer {
    fn new(config: &Config, sink: FileSink, running: Arc<AtomicBool>) -> Self {
        Self {
            snapshot: Vec::new(),
            outbuf: FormatBuffer::with_capacity(config.format_buffer_size),
            sink,
            running,
            cpu_affinity: config.cpu_affinity,
        }
    }

    fn run(mut self) {
        if let Some(core) = self.cpu_affinity {
            pin_current_thread(core);
        }

        let registry = registry::registry();
        let mut iterations = 0usize;
        while self.running.load(Ordering::Acquire) {
            if registry.add_dirty() || registry.remove_dirty() {
                registry.refresh_snapshot(&mut self.snapshot);
            }

            let processed = self.process_one();

            iterations += 1;
            if iterations % FLUSH_INTERVAL == 0 {
                self.flush();
                registry.reclaim();
            }

            if !processed {
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        // Drain: keep refreshing and consuming until every queue is empty.
        loop {
            if registry.add_dirty() || registry.remove_dirty() {
                registry.refresh_snapshot(&mut self.snapshot);
            }
            if !self.process_one() {
                break;
            }
        }

        self.flush();
        self.snapshot.clear();
        registry.reclaim_all();
    }

    /// Consume the record with the minimum timestamp across all queues.
    /// Returns false when every queue is empty.
    fn process_one(&mut self) -> bool {
        let mut best: Option<(usize, u64)> = None;
        for (index, handle) in self.snapshot.iter().enumerate() {
            let Some(header) = handle.queue.peek(HEADER_SIZE) else {
                continue;
            };
            let timestamp = RecordHeader::peek_timestamp(header);
            match best {
                Some((_, min)) if timestamp >= min => {}
                _ => best = Some((index, timestamp)),
            }
        }

        let Some((index, _)) = best else {
            return false;
        };
        let handle = &self.snapshot[index];

        // Re-peeking is exact: only this thread advances read positions.
        let Some(header_bytes) = handle.queue.peek(HEADER_SIZE) else {
            return false;
        };
        let header = RecordHeader::read_from(header_bytes);
        handle.queue.commit_read(HEADER_SIZE);

        let mut writer = self.outbuf.writer_with_sink(&mut self.sink);
        writer.push_slice(level::tag_from_raw(header.level).as_bytes());
        writer.push_byte(b' ');
        write_clock_prefix(header.timestamp, &mut writer);
        writer.push_byte(b' ');

        let args_size = header.args_size as usize;
        if args_size > 0 {
            let Some(payload) = handle.queue.peek(args_size) else {
                // A committed record is always whole; nothing to salvage.
                writer.push_byte(b'\n');
                return true;
            };
            (header.decoder)(payload, &mut writer);
            handle.queue.commit_read(args_size);
        }
        writer.push_byte(b'\n');
        drop(writer);

        // A drained orphan is ready for the registry's next remove cycle.
        if handle.orphaned.load(Ordering::Acquire) && handle.queue.is_empty() {
            registry::registry().raise_remove();
        }
        true
    }

    fn flush(&mut self) {
        if let Err(err) = self.outbuf.drain_to(&mut self.sink) {
            log::warn!("flashlog sink write failed: {err}");
        }
        if let Err(err) = self.sink.flush() {
            log::warn!("flashlog sink sync failed: {err}");
        }
    }
}

/// Digit-pair lookup table: index 2n is the tens digit of n, 2n+1 the ones.
const DIGIT_PAIRS: &[u8; 200] = b"0001020304050607080910111213141516171819\
2021222324252627282930313233343536373839\
4041424344454647484950515253545556575859\
6061626364656667686970717273747576777879\
8081828384858687888990919293949596979899";

/// Write the `HH:MM:SS:mmm` time-of-day prefix for an epoch-nanosecond
/// timestamp, without allocating.
fn write_clock_prefix(timestamp_ns: u64, out: &mut LineWriter<'_>) {
    let total_ms = timestamp_ns / 1_000_000;
    let millis = (total_ms % 1_000) as usize;
    let day_seconds = (total_ms / 1_000) % 86_400;
    let hours = (day_seconds / 3_600) as usize;
    let minutes = ((day_seconds / 60) % 60) as usize;
    let seconds = (day_seconds % 60) as usize;

    let mut buf = [0u8; 12];
    buf[0] = DIGIT_PAIRS[hours * 2];
    buf[1] = DIGIT_PAIRS[hours * 2 + 1];
    buf[2] = b':';
    buf[3] = DIGIT_PAIRS[minutes * 2];
    buf[4] = DIGIT_PAIRS[minutes * 2 + 1];
    buf[5] = b':';
    buf[6] = DIGIT_PAIRS[seconds * 2];
    buf[7] = DIGIT_PAIRS[seconds * 2 + 1];
    buf[8] = b':';
    buf[9] = b'0' + (millis / 100) as u8;
    buf[10] = DIGIT_PAIRS[(millis % 100) * 2];
    buf[11] = DIGIT_PAIRS[(millis % 100) * 2 + 1];
    out.push_slice(&buf);
}

#[cfg(target_os = "linux")]
fn pin_current_thread(core: usize) {
    // SAFETY: cpu_set_t is plain data; sched_setaffinity on the calling
    // thread (pid 0) either succeeds or leaves affinity unchanged.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_SET(core, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            log::warn!(
                "flashlog could not pin consumer to core {core}: {}",
                std::io::Error::last_os_error()
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_current_thread(_core: usize) {}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_prefix(timestamp_ns: u64) -> String {
        let mut buf = FormatBuffer::with_capacity(1024);
        {
            let mut writer = buf.writer();
            write_clock_prefix(timestamp_ns, &mut writer);
        }
        let mut out = vec![0u8; buf.len()];
        let n = buf.read_into(&mut out);
        out.truncate(n);
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn clock_prefix_formats_time_of_day() {
        // 01:02:03.004 into the day.
        let ns = ((3_600 + 2 * 60 + 3) * 1_000 + 4) * 1_000_000u64;
        assert_eq!(render_prefix(ns), "01:02:03:004");
    }

    #[test]
    fn clock_prefix_wraps_at_midnight() {
        let one_day_ns = 86_400u64 * 1_000_000_000;
        assert_eq!(render_prefix(one_day_ns), "00:00:00:000");
        assert_eq!(render_prefix(one_day_ns - 1_000_000), "23:59:59:999");
    }
}
