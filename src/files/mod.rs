//! Local storage for recordings and shareable ticket artwork

use crate::config::StorageConfig;
use crate::tickets::Ticket;
use crate::utils::format::{recording_file_name, AUDIO_EXTENSIONS};
use crate::{Result, SoundsUpError};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Audio,
    Image,
    Document,
    Other,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Audio
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Image
        } else if DOCUMENT_EXTENSIONS.contains(&ext.as_str()) {
            FileKind::Document
        } else {
            FileKind::Other
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub kind: FileKind,
    pub modified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageInfo {
    pub total_size: u64,
    pub audio_size: u64,
    pub cache_size: u64,
}

pub struct FileManager {
    audio_dir: PathBuf,
    cache_dir: PathBuf,
}

impl FileManager {
    pub fn new(audio_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            audio_dir: audio_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.audio_dir, &config.cache_dir)
    }

    pub fn audio_dir(&self) -> &Path {
        &self.audio_dir
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.audio_dir).await?;
        fs::create_dir_all(&self.cache_dir).await?;
        Ok(())
    }

    /// Copy a recording into the audio directory
    ///
    /// Without a name the copy is called `recording_<unix ms>.m4a`.
    pub async fn save_audio_file(&self, source: &Path, name: Option<&str>) -> Result<PathBuf> {
        let name = match name {
            Some(name) => sanitize_file_name(name)?,
            None => recording_file_name(Utc::now()),
        };

        fs::create_dir_all(&self.audio_dir).await?;
        let destination = self.audio_dir.join(name);
        fs::copy(source, &destination).await?;

        debug!("Saved {} to {}", source.display(), destination.display());
        Ok(destination)
    }

    /// Metadata for a file, or `None` if it does not exist
    pub async fn file_info(&self, path: &Path) -> Option<FileInfo> {
        let metadata = fs::metadata(path).await.ok()?;
        if !metadata.is_file() {
            return None;
        }

        let modified = metadata.modified().unwrap_or_else(|_| SystemTime::now());
        Some(FileInfo {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "unknown".to_string()),
            size: metadata.len(),
            kind: FileKind::from_path(path),
            modified_at: DateTime::<Utc>::from(modified),
        })
    }

    pub async fn delete_file(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                false
            }
        }
    }

    /// Audio directory contents, newest first
    pub async fn audio_files(&self) -> Vec<FileInfo> {
        self.directory_files(&self.audio_dir).await
    }

    pub async fn clear_cache(&self) -> Result<()> {
        match fs::remove_dir_all(&self.cache_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        fs::create_dir_all(&self.cache_dir).await?;
        Ok(())
    }

    pub async fn storage_info(&self) -> StorageInfo {
        let audio_size = total_size(&self.directory_files(&self.audio_dir).await);
        let cache_size = total_size(&self.directory_files(&self.cache_dir).await);
        StorageInfo {
            total_size: audio_size + cache_size,
            audio_size,
            cache_size,
        }
    }

    /// Write a ticket's inline artwork to the cache so it can be shared
    pub async fn save_ticket_image(&self, ticket: &Ticket) -> Result<PathBuf> {
        let image = ticket.image.as_ref().ok_or_else(|| {
            SoundsUpError::IOError(format!("ticket {} has no image", ticket.id))
        })?;
        let (mime, bytes) = image.decode().ok_or_else(|| {
            SoundsUpError::IOError(format!("ticket {} image is not inline", ticket.id))
        })?;

        let extension = match mime.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            _ => "jpg",
        };
        let name = sanitize_file_name(&format!("ticket_{}.{}", ticket.id, extension))?;

        fs::create_dir_all(&self.cache_dir).await?;
        let path = self.cache_dir.join(name);
        fs::write(&path, bytes).await?;
        Ok(path)
    }

    async fn directory_files(&self, dir: &Path) -> Vec<FileInfo> {
        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(info) = self.file_info(&entry.path()).await {
                files.push(info);
            }
        }
        files.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));
        files
    }
}

fn total_size(files: &[FileInfo]) -> u64 {
    files.iter().map(|f| f.size).sum()
}

/// Reject names that would escape the target directory
fn sanitize_file_name(name: &str) -> Result<String> {
    let name = name.trim();
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(SoundsUpError::IOError(format!("invalid file name: {:?}", name)));
    }
    Ok(name.to_string())
}
