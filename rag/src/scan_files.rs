use std::fs;
use std::path::Path;

use tracing::warn;
use walkdir::WalkDir;

use crate::config::Config;
use crate::error::{RagError, Result};

/// Reads every recognized text file directly inside the corpus folder.
///
/// Subdirectories are not descended into. Results come back in file-name order
/// so chunk positions are stable from one run to the next.
pub fn scan_files(cfg: &Config) -> Result<Vec<(String, String)>> {
    let base = &cfg.source_dir;
    if !base.is_dir() {
        return Err(RagError::Configuration(format!(
            "{} does not exist or is not a directory. Place your text files there.",
            base.display()
        )));
    }

    let mut results = Vec::new();
    let walker = WalkDir::new(base)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            RagError::Configuration(format!("cannot read {}: {}", base.display(), e))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if !is_text_file(path, &cfg.include_exts) {
            continue;
        }
        if let Ok(meta) = fs::metadata(path) {
            if meta.len() > cfg.max_file_bytes {
                warn!(path = %path.display(), bytes = meta.len(), "skipping oversized file");
                continue;
            }
        }
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "skipping unreadable file");
                continue;
            }
        };
        match String::from_utf8(bytes) {
            Ok(text) => results.push((path.to_string_lossy().to_string(), text)),
            Err(_) => warn!(path = %path.display(), "skipping file that is not valid UTF-8"),
        }
    }

    Ok(results)
}

fn is_text_file(path: &Path, exts: &[String]) -> bool {
    let lower = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    exts.iter().any(|ext| lower.ends_with(ext.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg_for(dir: &Path) -> Config {
        Config {
            source_dir: dir.to_path_buf(),
            ..Config::default()
        }
    }

    #[test]
    fn missing_folder_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = cfg_for(&dir.path().join("nope"));
        assert!(matches!(scan_files(&cfg), Err(RagError::Configuration(_))));
    }

    #[test]
    fn reads_only_top_level_text_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.txt"), "second").unwrap();
        fs::write(dir.path().join("a.TXT"), "first").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("c.txt"), "ignored").unwrap();

        let files = scan_files(&cfg_for(dir.path())).unwrap();
        let texts: Vec<&str> = files.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(texts, vec!["first", "second"]);
    }

    #[test]
    fn skips_invalid_utf8_and_oversized_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.txt"), b"\xff\xfe\xfd").unwrap();
        fs::write(dir.path().join("big.txt"), "x".repeat(64)).unwrap();
        fs::write(dir.path().join("ok.txt"), "fine").unwrap();

        let cfg = Config {
            max_file_bytes: 32,
            ..cfg_for(dir.path())
        };
        let files = scan_files(&cfg).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].1, "fine");
    }
}
