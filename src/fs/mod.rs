//! File access module
//!
//! Resolves logical request paths against the served root directory and
//! exposes metadata, listing, open, delete and create operations on it.

use crate::error::{TransferError, TransferResult};
use crate::http::mime::{self, FileKind};
use crate::logger;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Metadata snapshot of a served file, taken per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// Logical path relative to the root, `/`-separated
    pub path: String,
    pub modified_at: SystemTime,
    pub size: u64,
    pub is_dir: bool,
}

impl FileMetadata {
    /// Final path segment
    pub fn basename(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    pub fn kind(&self) -> FileKind {
        mime::file_kind(&self.path)
    }

    pub fn content_type(&self) -> &'static str {
        mime::get_content_type(&self.path)
    }
}

/// The directory tree being served
///
/// Immutable once built; cloned into every request that needs it.
#[derive(Debug, Clone)]
pub struct FileRoot {
    dir: PathBuf,
}

impl FileRoot {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Map a logical path onto the filesystem without leaving the root
    ///
    /// `.` and empty segments are ignored; `..` and absolute components are
    /// rejected as not found.
    pub fn resolve(&self, path: &str) -> TransferResult<PathBuf> {
        let mut resolved = self.dir.clone();
        for component in Path::new(path.trim_start_matches('/')).components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    logger::log_warning(&format!("Path traversal attempt blocked: {path}"));
                    return Err(TransferError::NotFound(path.to_string()));
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve `path` to its current size, mtime and directory flag
    pub async fn stat(&self, path: &str) -> TransferResult<FileMetadata> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path)
            .await
            .map_err(|e| TransferError::from_io(path, e))?;

        Ok(FileMetadata {
            path: path.to_string(),
            modified_at: meta.modified()?,
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    /// Open `path` for reading
    pub async fn open(&self, path: &str) -> TransferResult<fs::File> {
        let full_path = self.resolve(path)?;
        fs::File::open(&full_path)
            .await
            .map_err(|e| TransferError::from_io(path, e))
    }

    /// List one page of a directory, entries sorted by name
    pub async fn list(
        &self,
        path: &str,
        page: usize,
        page_size: usize,
    ) -> TransferResult<Vec<FileMetadata>> {
        let full_path = self.resolve(path)?;
        let mut entries = fs::read_dir(&full_path)
            .await
            .map_err(|e| TransferError::from_io(path, e))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();

        let mut files = Vec::with_capacity(page_size);
        for name in names.iter().skip(page.saturating_mul(page_size)).take(page_size) {
            files.push(self.stat(&join_path(path, name)).await?);
        }
        Ok(files)
    }

    /// Remove a single file
    pub async fn delete(&self, path: &str) -> TransferResult<()> {
        let full_path = self.resolve(path)?;
        fs::remove_file(&full_path)
            .await
            .map_err(|e| TransferError::from_io(path, e))
    }

    /// Start writing `file_name` inside directory `dir`
    ///
    /// Only the final component of `file_name` is kept. Bytes go to a
    /// `.part` sibling; an existing file of the same name is replaced only
    /// when the returned [`PendingFile`] is committed.
    pub async fn create(&self, dir: &str, file_name: &str) -> TransferResult<PendingFile> {
        let name = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                TransferError::IoFault(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid file name: {file_name:?}"),
                ))
            })?;

        let logical = join_path(dir, name);
        let target = self.resolve(&logical)?;
        let part = target.with_file_name(format!("{name}.part"));
        let file = fs::File::create(&part)
            .await
            .map_err(|e| TransferError::from_io(&logical, e))?;

        Ok(PendingFile {
            logical,
            target,
            part,
            file: Some(file),
            committed: false,
        })
    }
}

/// Upload in progress
///
/// Dropping it without [`PendingFile::commit`] removes the partial file and
/// leaves the target untouched.
#[derive(Debug)]
pub struct PendingFile {
    logical: String,
    target: PathBuf,
    part: PathBuf,
    /// Open until commit or drop
    file: Option<fs::File>,
    committed: bool,
}

impl PendingFile {
    pub fn logical_path(&self) -> &str {
        &self.logical
    }

    pub async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.write_all(data).await,
            None => Err(io::Error::from(io::ErrorKind::BrokenPipe)),
        }
    }

    /// Flush and move the data over the target, returning its logical path
    pub async fn commit(mut self) -> TransferResult<String> {
        if let Some(mut file) = self.file.take() {
            file.flush()
                .await
                .map_err(|e| TransferError::from_io(&self.logical, e))?;
        }
        fs::rename(&self.part, &self.target)
            .await
            .map_err(|e| TransferError::from_io(&self.logical, e))?;
        self.committed = true;
        Ok(std::mem::take(&mut self.logical))
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if self.committed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.part) {
            if e.kind() != io::ErrorKind::NotFound {
                logger::log_warning(&format!(
                    "Could not remove partial upload {}: {e}",
                    self.part.display()
                ));
            }
        }
    }
}

/// Join a logical directory and an entry name
pub fn join_path(dir: &str, name: &str) -> String {
    let dir = dir.trim_end_matches('/');
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}

/// Logical parent directory, empty for top-level entries
pub fn parent_path(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit_once('/')
        .map_or("", |(parent, _)| parent)
}
