//! Attachment lookup for the file-serving layer.
//!
//! Records name an attachment (a scanned contract) in a configured filename
//! column. This module only answers whether that file exists under the
//! attachment root; serving bytes is left to the caller, which should use
//! [`resolve`] so that nothing outside the root is ever handed out.

use std::path::{Component, Path, PathBuf};

/// The path of `filename` under `root`, if it names a regular file that
/// resolves strictly inside `root` (symlinks included).
pub fn resolve(root: &Path, filename: &str) -> Option<PathBuf> {
    let filename = filename.trim();
    if filename.is_empty() {
        return None;
    }
    let relative = Path::new(filename);
    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    let root = root.canonicalize().ok()?;
    let candidate = root.join(relative).canonicalize().ok()?;
    (candidate != root && candidate.starts_with(&root) && candidate.is_file()).then_some(candidate)
}

pub fn exists(root: &Path, filename: &str) -> bool {
    resolve(root, filename).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn only_files_inside_the_root_exist() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("contracts.pdf");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("a.pdf"), b"%PDF").unwrap();
        fs::write(dir.path().join("outside.pdf"), b"%PDF").unwrap();

        assert!(exists(&root, "a.pdf"));
        assert!(exists(&root, " a.pdf "));
        assert!(!exists(&root, "missing.pdf"));
        assert!(!exists(&root, ""));
        assert!(!exists(&root, "../outside.pdf"));
        assert!(!exists(&root, "/etc/passwd"));
        assert!(!exists(&dir.path().join("nowhere"), "a.pdf"));
    }
}
