mod common;

use flashlog::{backend_start, backend_stop, Config, Level};
use tempfile::tempdir;

#[test]
fn records_below_min_level_are_discarded_before_encoding() {
    let dir = tempdir().expect("tempdir");
    backend_start(Config {
        log_dir: dir.path().to_path_buf(),
        min_level: Level::Warn,
        ..Config::default()
    })
    .expect("backend start");

    flashlog::trace!("suppressed {}", 1);
    flashlog::debug!("suppressed {}", 2);
    flashlog::info!("suppressed {}", 3);
    flashlog::warn!("visible {}", 4);
    flashlog::error!("visible {}", 5);
    flashlog::fatal!("visible {}", 6);

    backend_stop();

    let lines = common::read_lines(dir.path());
    assert_eq!(lines.len(), 3, "lines: {lines:?}");
    assert!(lines[0].starts_with("[WARN] ") && lines[0].ends_with("visible 4"));
    assert!(lines[1].starts_with("[ERROR] ") && lines[1].ends_with("visible 5"));
    assert!(lines[2].starts_with("[FATAL] ") && lines[2].ends_with("visible 6"));
}
