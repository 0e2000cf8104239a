use std::path::Path;

/// All output lines across every log file in `dir`, in stream order
/// (files sorted by date, then by numeric rotation counter).
pub fn read_lines(dir: &Path) -> Vec<String> {
    let mut files: Vec<(String, u32, String)> = std::fs::read_dir(dir)
        .expect("read log dir")
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .filter(|name| name.ends_with(".log"))
        .map(|name| {
            let stem = name.strip_suffix(".log").expect("log suffix");
            let (date, counter) = stem.split_once('_').expect("date_counter name");
            let counter: u32 = counter.parse().expect("numeric rotation counter");
            (date.to_owned(), counter, name.clone())
        })
        .collect();
    files.sort();

    let mut lines = Vec::new();
    for (_, _, name) in files {
        let content = std::fs::read_to_string(dir.join(name)).expect("read log file");
        lines.extend(content.lines().map(str::to_owned));
    }
    lines
}

/// Number of `.log` files in `dir`.
#[allow(dead_code)]
pub fn log_file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .expect("read log dir")
        .filter(|entry| {
            entry
                .as_ref()
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .ends_with(".log")
        })
        .count()
}
