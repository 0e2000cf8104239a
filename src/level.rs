use std::sync::atomic::{AtomicU8, Ordering};

/// Log severity. Records below the runtime minimum are discarded before
/// any encoding work happens.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

static MIN_LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

impl Level {
    /// The bracketed tag that prefixes every output line.
    pub fn tag(self) -> &'static str {
        tag_from_raw(self as u8)
    }
}

pub(crate) fn tag_from_raw(raw: u8) -> &'static str {
    match raw {
        0 => "[TRACE]",
        1 => "[DEBUG]",
        2 => "[INFO]",
        3 => "[WARN]",
        4 => "[ERROR]",
        5 => "[FATAL]",
        _ => "[UNKNOWN]",
    }
}

/// Set the minimum severity accepted by `submit`. Defaults to `Info`.
pub fn set_min_level(level: Level) {
    MIN_LEVEL.store(level as u8, Ordering::Relaxed);
}

#[inline]
pub(crate) fn enabled(level: Level) -> bool {
    level as u8 >= MIN_LEVEL.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_cover_all_levels() {
        assert_eq!(Level::Trace.tag(), "[TRACE]");
        assert_eq!(Level::Fatal.tag(), "[FATAL]");
        assert_eq!(tag_from_raw(42), "[UNKNOWN]");
    }

    #[test]
    fn gate_follows_min_level() {
        set_min_level(Level::Warn);
        assert!(!enabled(Level::Info));
        assert!(enabled(Level::Warn));
        assert!(enabled(Level::Fatal));
        set_min_level(Level::Info);
    }
}
