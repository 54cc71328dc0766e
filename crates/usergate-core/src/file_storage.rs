//! Staged local file storage.
//!
//! Uploads are written in two phases. Every file is first written to a hidden
//! `.<name>.part` file inside its destination directory, then all staged files
//! are renamed into place by [`StagedUpload::commit`]. A rename within one
//! directory never copies data, so either every file of a request becomes
//! visible or none does.
//!
//! A [`StagedUpload`] that is dropped before `commit` returns successfully
//! (failure, timeout, or the request future being cancelled) removes its
//! staged files and any files it had already renamed.
//!
//! # Example
//!
//! ```ignore
//! use usergate_core::file_storage::StagedUpload;
//!
//! let mut upload = StagedUpload::begin(Path::new("./uploads/images")).await?;
//! upload.stage("avatar_1700000000_3f2a.png", &bytes).await?;
//! let paths = upload.commit().await?;
//! ```

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to create upload directory '{}': {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

struct StagedFile {
    temp: PathBuf,
    target: PathBuf,
}

/// Files of one request, staged in a single destination directory.
pub struct StagedUpload {
    dir: PathBuf,
    staged: Vec<StagedFile>,
    committed: Vec<PathBuf>,
    finished: bool,
}

impl StagedUpload {
    /// Create the destination directory (and parents) if needed.
    pub async fn begin(dir: &Path) -> Result<Self, StorageError> {
        fs::create_dir_all(dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: dir.to_path_buf(),
                source,
            })?;

        Ok(Self {
            dir: dir.to_path_buf(),
            staged: Vec::new(),
            committed: Vec::new(),
            finished: false,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Write `content` to a hidden staging file. Returns the final path the
    /// file will have once committed.
    pub async fn stage(&mut self, file_name: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        validate_file_name(file_name)?;

        let target = self.dir.join(file_name);
        let temp = self.dir.join(format!(".{file_name}.part"));

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .await?;

        // Track before writing so a failed or cancelled write is cleaned up.
        self.staged.push(StagedFile {
            temp,
            target: target.clone(),
        });

        file.write_all(content).await?;
        file.sync_all().await?;

        Ok(target)
    }

    /// Rename every staged file into place.
    ///
    /// On failure the upload is dropped, which removes both the files still
    /// staged and the ones already renamed.
    pub async fn commit(mut self) -> Result<Vec<PathBuf>, StorageError> {
        // An entry leaves `staged` only after its rename has landed, so a
        // rename still in flight when this future is dropped is covered.
        while let Some(file) = self.staged.first() {
            fs::rename(&file.temp, &file.target).await?;
            let file = self.staged.remove(0);
            self.committed.push(file.target);
        }

        self.finished = true;
        debug!(dir = %self.dir.display(), files = self.committed.len(), "Upload committed");
        Ok(std::mem::take(&mut self.committed))
    }
}

impl Drop for StagedUpload {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        // Temp before target: a rename racing this drop has either not
        // happened yet (and will fail) or has already produced the target.
        let leftovers = self
            .staged
            .iter()
            .flat_map(|file| [&file.temp, &file.target])
            .chain(self.committed.iter());

        // Blocking removal is intentional: Drop cannot await, and a request
        // holds at most `max_files` files.
        for path in leftovers {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "Removed uncommitted upload file"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove upload file"),
            }
        }
    }
}

/// A stored file name must be a single, non-hidden path segment.
fn validate_file_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains("..") || name.starts_with('.') {
        return Err(StorageError::InvalidName(
            "Name must not be empty, contain '..', or start with '.'".to_string(),
        ));
    }

    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(StorageError::InvalidName(
            "Name contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_validate_file_name_accepts_generated_names() {
        assert!(validate_file_name("photo_1700000000_0a1b2c.png").is_ok());
        assert!(validate_file_name("report-final_1700000000_ff.pdf").is_ok());
    }

    #[test]
    fn test_validate_file_name_rejects_traversal_and_separators() {
        assert!(validate_file_name("../../../etc/passwd").is_err());
        assert!(validate_file_name("nested/file.png").is_err());
        assert!(validate_file_name("..\\windows\\system32").is_err());
        assert!(validate_file_name(".hidden").is_err());
        assert!(validate_file_name("").is_err());
    }

    #[tokio::test]
    async fn test_begin_creates_nested_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("uploads").join("images");

        let upload = StagedUpload::begin(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(upload.dir(), dir.as_path());
    }

    #[tokio::test]
    async fn test_staged_files_are_hidden_until_commit() {
        let root = tempfile::tempdir().unwrap();
        let mut upload = StagedUpload::begin(root.path()).await.unwrap();

        let target = upload.stage("a.png", b"one").await.unwrap();
        upload.stage("b.png", b"two").await.unwrap();
        assert!(!target.exists());
        assert_eq!(entries(root.path()), vec![".a.png.part", ".b.png.part"]);

        let paths = upload.commit().await.unwrap();
        assert_eq!(paths.len(), 2);
        assert_eq!(entries(root.path()), vec!["a.png", "b.png"]);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"one");
    }

    #[tokio::test]
    async fn test_drop_without_commit_removes_staged_files() {
        let root = tempfile::tempdir().unwrap();
        let mut upload = StagedUpload::begin(root.path()).await.unwrap();
        upload.stage("a.png", b"one").await.unwrap();
        assert_eq!(upload.staged_len(), 1);

        drop(upload);
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_renamed_files() {
        let root = tempfile::tempdir().unwrap();
        let mut upload = StagedUpload::begin(root.path()).await.unwrap();
        upload.stage("a.png", b"one").await.unwrap();
        upload.stage("b.png", b"two").await.unwrap();

        // Make the second rename fail.
        std::fs::remove_file(root.path().join(".b.png.part")).unwrap();

        assert!(upload.commit().await.is_err());
        assert!(entries(root.path()).is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_commit_leaves_no_files() {
        let root = tempfile::tempdir().unwrap();
        let mut upload = StagedUpload::begin(root.path()).await.unwrap();
        upload.stage("a.png", b"one").await.unwrap();
        upload.stage("b.png", b"two").await.unwrap();

        // Poll once so the first rename is in flight, then drop the future.
        let result = tokio::time::timeout(Duration::ZERO, upload.commit()).await;
        assert!(result.is_err());

        // Let the blocking pool finish the abandoned rename.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(entries(root.path()).is_empty(), "{:?}", entries(root.path()));
    }

    #[tokio::test]
    async fn test_stage_rejects_invalid_name() {
        let root = tempfile::tempdir().unwrap();
        let mut upload = StagedUpload::begin(root.path()).await.unwrap();

        let err = upload.stage("../escape.png", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
        assert_eq!(upload.staged_len(), 0);
    }
}
