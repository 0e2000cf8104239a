mod common;

use flashlog::{backend_start, backend_stop, Config};
use tempfile::tempdir;

/// Line geometry: "[INFO] " + "HH:MM:SS:mmm" + " " is 20 bytes, so a
/// 107-byte message plus the newline makes every line exactly 128 bytes.
/// With a 512-byte staging buffer the sink receives 256-byte chunks, which
/// pack a 4096-byte file ceiling exactly: 96 lines = 12 KiB = three files.
const LINE_LEN: usize = 128;
const LINES: usize = 96;

#[test]
fn size_rotation_splits_the_stream_across_numbered_files() {
    let dir = tempdir().expect("tempdir");
    backend_start(Config {
        log_dir: dir.path().to_path_buf(),
        max_file_size: 4096,
        format_buffer_size: 512,
        ..Config::default()
    })
    .expect("backend start");

    for i in 0..LINES {
        let body = format!("{:03} {}", i, "x".repeat(103));
        assert_eq!(body.len() + 20 + 1, LINE_LEN);
        flashlog::info!("{}", body);
    }

    backend_stop();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read log dir")
        .map(|entry| entry.expect("dir entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    assert_eq!(names.len(), 3, "files: {names:?}");
    for (idx, name) in names.iter().enumerate() {
        assert!(
            name.ends_with(&format!("_{}.log", idx + 1)),
            "unexpected name {name}"
        );
        let size = std::fs::metadata(dir.path().join(name)).expect("metadata").len();
        assert_eq!(size, 4096, "file {name} has size {size}");
    }

    // The concatenation is the full stream, in order.
    let lines = common::read_lines(dir.path());
    assert_eq!(lines.len(), LINES);
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line.len(), LINE_LEN - 1); // newline stripped
        assert!(line.contains(&format!(" {:03} ", i)), "line {i}: {line}");
    }
}
