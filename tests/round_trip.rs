mod common;

use flashlog::{backend_start, backend_stop, Config};
use tempfile::tempdir;

const TIME_PREFIX_LEN: usize = "HH:MM:SS:mmm".len();

#[test]
fn records_round_trip_to_disk() {
    let dir = tempdir().expect("tempdir");
    backend_start(Config {
        log_dir: dir.path().to_path_buf(),
        ..Config::default()
    })
    .expect("backend start");

    // Scalar mix.
    flashlog::info!("int={} double={}", 42, 3.14);

    // Owned string, copied into the payload.
    let s = String::from("world");
    flashlog::info!("hello {}", s);

    // Mutation after submit must not leak into the output.
    let mut buffer = String::from("original");
    flashlog::info!("v={}", buffer);
    buffer.clear();
    buffer.push_str("changed");

    // Program-lifetime string, pointer-encoded.
    flashlog::warn!("shutting {} down", "gracefully");

    backend_stop();

    let lines = common::read_lines(dir.path());
    assert_eq!(lines.len(), 4, "lines: {lines:?}");

    assert!(lines[0].starts_with("[INFO] "));
    assert!(lines[0].ends_with("int=42 double=3.14"), "got {}", lines[0]);
    assert!(lines[1].ends_with("hello world"), "got {}", lines[1]);
    assert!(lines[2].ends_with("v=original"), "got {}", lines[2]);
    assert!(lines[3].starts_with("[WARN] "));
    assert!(lines[3].ends_with("shutting gracefully down"), "got {}", lines[3]);

    // Every line carries an HH:MM:SS:mmm prefix after the level tag.
    for line in &lines {
        let tag_end = line.find(' ').expect("space after level tag");
        let clock = &line[tag_end + 1..tag_end + 1 + TIME_PREFIX_LEN];
        let bytes = clock.as_bytes();
        assert_eq!(bytes[2], b':');
        assert_eq!(bytes[5], b':');
        assert_eq!(bytes[8], b':');
        assert!(clock
            .bytes()
            .enumerate()
            .all(|(i, b)| matches!(i, 2 | 5 | 8) || b.is_ascii_digit()));
    }
}
