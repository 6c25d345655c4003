use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("output directory missing or not writable: {0}")]
    OutputDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Ensure output directory exists; create if missing.
pub fn ensure_output_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::OutputDir(format!(
                "{} is not a directory",
                dir.display()
            )));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    }
    // Basic writability probe: try creating a temp file.
    NamedTempFile::new_in(dir).map_err(|e| PersistError::OutputDir(e.to_string()))?;
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: impl AsRef<Path>, content: &[u8]) -> Result<PathBuf, PersistError> {
        ensure_output_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content)?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        tmp.persist(&target).map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

/// Where work items put their output.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Writes `bytes` to `path` in one step, creating parent directories.
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PersistError>;

    /// Opens `path` for a streamed write, truncating whatever is there.
    async fn create(&self, path: &Path) -> Result<Box<dyn ChunkWriter>, PersistError>;
}

#[async_trait]
pub trait ChunkWriter: Send {
    async fn append(&mut self, chunk: &[u8]) -> Result<(), PersistError>;

    async fn finish(self: Box<Self>) -> Result<(), PersistError>;
}

/// Local filesystem persistence.
///
/// One-shot writes go through [`AtomicFileWriter`]. Streamed writes land
/// directly at their final path, so an interrupted stream leaves a short file
/// behind rather than a complete-looking one.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsPersistence;

#[async_trait]
impl Persistence for FsPersistence {
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
        let dir = parent_dir(path);
        let filename = path
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| PersistError::OutputDir(format!("{} has no file name", path.display())))?;
        let content = bytes.to_vec();

        tokio::task::spawn_blocking(move || AtomicFileWriter::new(dir).write(filename, &content))
            .await
            .map_err(|err| PersistError::Io(io::Error::other(err)))??;
        Ok(())
    }

    async fn create(&self, path: &Path) -> Result<Box<dyn ChunkWriter>, PersistError> {
        tokio::fs::create_dir_all(parent_dir(path))
            .await
            .map_err(|e| PersistError::OutputDir(e.to_string()))?;
        let file = tokio::fs::File::create(path).await?;
        Ok(Box::new(FsChunkWriter {
            inner: BufWriter::new(file),
        }))
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

struct FsChunkWriter {
    inner: BufWriter<tokio::fs::File>,
}

#[async_trait]
impl ChunkWriter for FsChunkWriter {
    async fn append(&mut self, chunk: &[u8]) -> Result<(), PersistError> {
        self.inner.write_all(chunk).await?;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<(), PersistError> {
        self.inner.flush().await?;
        Ok(())
    }
}
