// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Request-scoped scratch storage.
//
// Every request reserves a pair of paths (original upload, enhanced image)
// under the scratch directory. Both names start with a fresh random token,
// so concurrent requests never share a path and no locking is needed. The
// reservation is a guard: dropping it deletes whatever was written, on every
// exit path including panics.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use textlift_core::error::{Result, TextliftError};
use textlift_core::types::ScratchToken;
use tracing::{debug, instrument, warn};

/// Longest sanitised filename kept in a scratch name, in bytes.
const MAX_FILENAME_LEN: usize = 100;

/// Name used when the client supplies no usable filename.
const FALLBACK_FILENAME: &str = "upload";

/// Directory holding per-request scratch files.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    root: PathBuf,
}

impl ScratchDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the directory (and parents) if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root).map_err(|err| {
            TextliftError::Scratch(format!(
                "cannot create scratch directory {}: {}",
                self.root.display(),
                err
            ))
        })
    }

    /// Reserve the scratch paths for one request. Nothing is created on disk.
    pub fn reserve(&self, filename: &str) -> ScratchFiles {
        let token = ScratchToken::new();
        let name = sanitize_filename(filename);
        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());

        let files = ScratchFiles {
            token,
            original: self.root.join(format!("{token}_{name}")),
            processed: self.root.join(format!("{token}_{stem}_proc.png")),
        };
        debug!(%token, original = %files.original.display(), "Scratch paths reserved");
        files
    }
}

/// The scratch files of a single request.
///
/// Both paths are tracked exactly as written and removed on drop.
#[derive(Debug)]
pub struct ScratchFiles {
    token: ScratchToken,
    original: PathBuf,
    processed: PathBuf,
}

impl ScratchFiles {
    pub fn token(&self) -> ScratchToken {
        self.token
    }

    pub fn original_path(&self) -> &Path {
        &self.original
    }

    pub fn processed_path(&self) -> &Path {
        &self.processed
    }

    /// Write the uploaded bytes. Fails rather than overwrite an existing file.
    #[instrument(skip_all, fields(token = %self.token, bytes = data.len()))]
    pub fn write_original(&self, data: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.original)
            .map_err(|err| {
                TextliftError::Scratch(format!(
                    "cannot create {}: {}",
                    self.original.display(),
                    err
                ))
            })?;
        file.write_all(data)?;
        file.flush()?;
        debug!("Original upload persisted");
        Ok(())
    }
}

impl Drop for ScratchFiles {
    fn drop(&mut self) {
        for path in [&self.original, &self.processed] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Scratch file removed"),
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => warn!(
                    path = %path.display(),
                    error = %err,
                    "Failed to remove scratch file"
                ),
            }
        }
    }
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and the result is capped at 100 bytes. Empty or dot-only names
/// become `upload`.
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let mut name: String = last
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.len() > MAX_FILENAME_LEN {
        // Keep the extension when truncating.
        let ext = Path::new(&name)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .filter(|e| e.len() < 16);
        match ext {
            Some(ext) => {
                let keep = MAX_FILENAME_LEN - ext.len() - 1;
                name = format!("{}.{}", &name[..keep], ext);
            }
            None => name.truncate(MAX_FILENAME_LEN),
        }
    }

    if name.chars().all(|c| c == '.') {
        return FALLBACK_FILENAME.to_string();
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_plain_names() {
        assert_eq!(sanitize_filename("receipt-01.png"), "receipt-01.png");
        assert_eq!(sanitize_filename("scan.final.jpeg"), "scan.final.jpeg");
    }

    #[test]
    fn sanitize_strips_directories() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\photo.jpg"), "photo.jpg");
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("my photo (1).png"), "my_photo__1_.png");
        assert_eq!(sanitize_filename("résumé.png"), "r_sum_.png");
    }

    #[test]
    fn sanitize_falls_back_for_empty_names() {
        assert_eq!(sanitize_filename(""), "upload");
        assert_eq!(sanitize_filename(".."), "upload");
        assert_eq!(sanitize_filename("dir/"), "upload");
    }

    #[test]
    fn sanitize_truncates_long_names_keeping_extension() {
        let long = format!("{}.png", "a".repeat(300));
        let name = sanitize_filename(&long);
        assert_eq!(name.len(), MAX_FILENAME_LEN);
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn reserved_paths_share_one_token() {
        let scratch = ScratchDir::new("/tmp/textlift-test");
        let files = scratch.reserve("page.jpg");
        let token = files.token().to_string();

        let original = files.original_path().file_name().unwrap().to_string_lossy();
        let processed = files.processed_path().file_name().unwrap().to_string_lossy();
        assert_eq!(original, format!("{token}_page.jpg"));
        assert_eq!(processed, format!("{token}_page_proc.png"));
    }

    #[test]
    fn dotless_filename_gets_distinct_processed_path() {
        let scratch = ScratchDir::new("/tmp/textlift-test");
        let files = scratch.reserve("image");
        assert_ne!(files.original_path(), files.processed_path());
        assert!(files.processed_path().to_string_lossy().ends_with("_image_proc.png"));
    }

    #[test]
    fn reservations_never_collide() {
        let scratch = ScratchDir::new("/tmp/textlift-test");
        let a = scratch.reserve("same.png");
        let b = scratch.reserve("same.png");
        assert_ne!(a.token(), b.token());
        assert_ne!(a.original_path(), b.original_path());
        assert_ne!(a.processed_path(), b.processed_path());
    }

    #[test]
    fn reserve_creates_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDir::new(dir.path().join("scratch"));
        let _files = scratch.reserve("page.png");
        assert!(!scratch.root().exists());
    }

    #[test]
    fn drop_removes_both_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDir::new(dir.path().join("scratch"));
        scratch.ensure_exists().expect("create");

        let files = scratch.reserve("page.png");
        files.write_original(b"bytes").expect("write original");
        std::fs::write(files.processed_path(), b"processed").expect("write processed");
        let (original, processed) = (
            files.original_path().to_path_buf(),
            files.processed_path().to_path_buf(),
        );
        assert!(original.exists() && processed.exists());

        drop(files);
        assert!(!original.exists());
        assert!(!processed.exists());
        assert_eq!(std::fs::read_dir(scratch.root()).unwrap().count(), 0);
    }

    #[test]
    fn drop_tolerates_files_never_written() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDir::new(dir.path());
        let files = scratch.reserve("page.png");
        drop(files);
    }

    #[test]
    fn drop_keeps_going_when_a_removal_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDir::new(dir.path());
        let files = scratch.reserve("page.png");
        std::fs::create_dir(files.original_path()).expect("directory at original path");
        std::fs::write(files.processed_path(), b"processed").expect("write processed");
        let (original, processed) = (
            files.original_path().to_path_buf(),
            files.processed_path().to_path_buf(),
        );

        drop(files);
        assert!(original.is_dir());
        assert!(!processed.exists());
    }

    #[test]
    fn write_original_refuses_to_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let scratch = ScratchDir::new(dir.path());
        let files = scratch.reserve("page.png");
        std::fs::write(files.original_path(), b"someone else").expect("pre-create");

        let result = files.write_original(b"mine");
        assert!(matches!(result, Err(TextliftError::Scratch(_))));
    }

    #[test]
    fn ensure_exists_fails_when_root_is_a_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").expect("write");

        let scratch = ScratchDir::new(&blocker);
        assert!(matches!(scratch.ensure_exists(), Err(TextliftError::Scratch(_))));
    }
}
