//! Filesystem scanning helpers for indexing passes.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::models::LANGUAGE_CSHARP;

const LANGUAGE_BY_EXTENSION: &[(&str, &str)] = &[(".cs", LANGUAGE_CSHARP)];

pub fn detect_language(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))?;
    LANGUAGE_BY_EXTENSION
        .iter()
        .find(|(e, _)| *e == ext.as_str())
        .map(|(_, lang)| *lang)
}

/// Walk `root` and return every file with a known language, sorted.
///
/// `.gitignore` files are honoured; directories whose name is in
/// `excluded_dirs` are never entered.
pub fn iter_source_files(root: &Path, excluded_dirs: &[String]) -> Vec<PathBuf> {
    let excluded: HashSet<String> = excluded_dirs.iter().cloned().collect();
    let walker = ignore::WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .git_global(false)
        .git_exclude(false)
        .require_git(false)
        .filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            !(is_dir
                && entry.depth() > 0
                && excluded.contains(entry.file_name().to_string_lossy().as_ref()))
        })
        .build();

    let mut files: Vec<PathBuf> = walker
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
        .map(|entry| entry.into_path())
        .filter(|path| detect_language(path).is_some())
        .collect();
    files.sort();
    files
}

/// Path of `path` relative to `root`, with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn detects_csharp_case_insensitively() {
        assert_eq!(detect_language(Path::new("a/B.cs")), Some("csharp"));
        assert_eq!(detect_language(Path::new("a/B.CS")), Some("csharp"));
        assert_eq!(detect_language(Path::new("a/b.py")), None);
    }

    #[test]
    fn walk_skips_excluded_and_ignored_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/App.cs", "class App {}");
        write(root, "src/readme.md", "# hi");
        write(root, "bin/Debug/Gen.cs", "class Gen {}");
        write(root, "obj/Tmp.cs", "class Tmp {}");
        write(root, "generated/Skip.cs", "class Skip {}");
        write(root, ".gitignore", "generated/\n");

        let excluded = vec!["bin".to_string(), "obj".to_string()];
        let files: Vec<String> = iter_source_files(root, &excluded)
            .iter()
            .map(|p| relative_path(root, p))
            .collect();
        assert_eq!(files, vec!["src/App.cs".to_string()]);
    }

    #[test]
    fn content_hash_is_hex_sha256() {
        let first = hash_bytes(b"class A {}");
        assert_eq!(first, hash_bytes(b"class A {}"));
        assert_ne!(first, hash_bytes(b"class A { }"));
        assert_eq!(first.len(), 64);
    }
}
