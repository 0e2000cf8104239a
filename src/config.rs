use std::path::PathBuf;

use crate::level::Level;

pub const DEFAULT_MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;
pub const DEFAULT_FORMAT_BUFFER_SIZE: usize = 1024 * 1024;
pub const DEFAULT_INITIAL_QUEUE_CAPACITY: usize = 4096;
pub const DEFAULT_QUEUE_CAPACITY_CEILING: usize = 64 * 1024 * 1024;

/// Construction-time knobs for the logging backend.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for output files. Created if absent.
    pub log_dir: PathBuf,
    /// Rotation threshold in bytes for a single output file.
    pub max_file_size: u64,
    /// Initial capacity of the consumer's staging buffer.
    pub format_buffer_size: usize,
    /// Minimum severity accepted by `submit`.
    pub min_level: Level,
    /// Pin the consumer thread to this core, if set.
    pub cpu_affinity: Option<usize>,
    /// Capacity of the first ring node of each producer queue.
    /// Rounded up to a power of two.
    pub initial_queue_capacity: usize,
    /// Maximum capacity a single ring node may grow to. Rounded up to a
    /// power of two. Writes that still don't fit are dropped and counted.
    pub queue_capacity_ceiling: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            format_buffer_size: DEFAULT_FORMAT_BUFFER_SIZE,
            min_level: Level::Info,
            cpu_affinity: None,
            initial_queue_capacity: DEFAULT_INITIAL_QUEUE_CAPACITY,
            queue_capacity_ceiling: DEFAULT_QUEUE_CAPACITY_CEILING,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.log_dir, PathBuf::from("./logs"));
        assert_eq!(config.max_file_size, 100 * 1024 * 1024);
        assert_eq!(config.format_buffer_size, 1024 * 1024);
        assert_eq!(config.min_level, Level::Info);
        assert_eq!(config.initial_queue_capacity, 4096);
        assert_eq!(config.queue_capacity_ceiling, 64 * 1024 * 1024);
    }
}
