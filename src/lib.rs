//! Asynchronous low-latency logging.
//!
//! Producers enqueue binary-encoded records onto per-thread wait-free byte
//! queues in tens of nanoseconds; a single background consumer merges all
//! queues in timestamp order, formats each record, and appends the text to
//! date-stamped, size-rotated files.
//!
//! # Pipeline
//!
//! ```text
//! submit → encoder → per-thread GrowableQueue ─┐
//! submit → encoder → per-thread GrowableQueue ─┤ min-timestamp merge
//! submit → encoder → per-thread GrowableQueue ─┘        │
//!                                     decoder → FormatBuffer → FileSink
//! ```
//!
//! Records carry a pointer to a call-site-specialized decoder, so the queue
//! holds raw argument bytes and all formatting cost lands on the consumer
//! thread. Under backpressure at the queue capacity ceiling records are
//! dropped and counted, never blocked on.
//!
//! # Example
//!
//! ```no_run
//! use flashlog::{backend_start, backend_stop, Config};
//!
//! backend_start(Config::default())?;
//! flashlog::info!("listener up on port {}", 8080);
//! backend_stop();
//! # Ok::<(), flashlog::Error>(())
//! ```

pub mod backend;
pub mod clock;
pub mod config;
pub mod encode;
pub mod error;
pub mod level;
mod macros;
pub mod outbuf;
pub mod queue;
pub mod record;
mod registry;
pub mod ring;
pub mod sink;

pub use backend::{backend_dropped_count, backend_reset_dropped_count, backend_start, backend_stop};
pub use clock::{set_clock, Clock, SystemClock, TscClock};
pub use config::Config;
pub use encode::{submit, Args, Encode, Value};
pub use error::{Error, Result};
pub use level::{set_min_level, Level};
