use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if let Ok(read_dir) = fs::read_dir(&dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                    files.push(path);
                }
            }
        }
    }
    files
}

fn file_contains(path: &Path, needle: &str) -> bool {
    fs::read_to_string(path)
        .map(|c| c.contains(needle))
        .unwrap_or(false)
}

#[test]
fn engine_reads_data_only_through_catalog_source() {
    let engine_root = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("src")
        .join("services")
        .join("recommendation");
    let mut offenders = Vec::new();
    for file in collect_rs_files(&engine_root) {
        if file.file_name().map(|n| n == "persistence.rs").unwrap_or(false) {
            continue;
        }
        if file_contains(&file, "std::fs") || file_contains(&file, "tokio::fs") {
            offenders.push(file);
        }
    }

    assert!(
        offenders.is_empty(),
        "Only persistence may touch the filesystem: {offenders:?}"
    );
}
