//! Policy-gated file access: read, write, and directory listing.
//!
//! Writes go to a same-directory temp file that is renamed into place, so a
//! concurrent reader never observes partial content and concurrent writers
//! are last-write-wins. No fsync — durability matches a plain write.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::error::GatewayError;
use crate::policy::Policy;

#[derive(Debug, Clone)]
pub struct ReadResult {
    pub content: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct WriteResult {
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirEntryInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

pub struct FileAccess {
    policy: Arc<Policy>,
}

impl FileAccess {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self { policy }
    }

    /// Read a file completely. `NotFound` if absent.
    pub fn read_file(&self, path: &Path) -> Result<ReadResult, GatewayError> {
        let path = self.policy.check_path(path)?;

        if !path.exists() {
            return Err(GatewayError::NotFound(format!(
                "file not found: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "reading file");
        let content = fs::read_to_string(&path)
            .map_err(|e| GatewayError::Internal(format!("read {}: {e}", path.display())))?;
        let size = content.len() as u64;
        Ok(ReadResult { content, size })
    }

    /// Write a file, creating missing parent directories. `mode` is an
    /// octal permission string like `"644"`, applied before the rename so
    /// the final file never exists with interim permissions.
    pub fn write_file(
        &self,
        path: &Path,
        content: &str,
        mode: Option<&str>,
    ) -> Result<WriteResult, GatewayError> {
        let path = self.policy.check_path(path)?;

        let mode_bits = mode
            .map(|m| {
                u32::from_str_radix(m, 8).map_err(|_| {
                    GatewayError::MalformedRequest(format!("invalid octal mode: {m}"))
                })
            })
            .transpose()?;

        let parent = path
            .parent()
            .ok_or_else(|| GatewayError::MalformedRequest("path has no parent".to_string()))?;
        fs::create_dir_all(parent)
            .map_err(|e| GatewayError::Internal(format!("create {}: {e}", parent.display())))?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GatewayError::MalformedRequest("path has no file name".to_string()))?;

        // Unique per process so concurrent writers of the same path do not
        // clobber each other's temp file; the final rename decides the winner.
        let tmp = parent.join(format!(".{}.{}.tmp", file_name, std::process::id()));

        debug!(path = %path.display(), bytes = content.len(), "writing file");
        let write_and_rename = (|| {
            fs::write(&tmp, content)?;
            #[cfg(unix)]
            if let Some(bits) = mode_bits {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&tmp, fs::Permissions::from_mode(bits))?;
            }
            fs::rename(&tmp, &path)
        })();

        if let Err(e) = write_and_rename {
            let _ = fs::remove_file(&tmp);
            return Err(GatewayError::Internal(format!(
                "write {}: {e}",
                path.display()
            )));
        }

        Ok(WriteResult {
            size: content.len() as u64,
            path,
        })
    }

    /// List immediate children only (non-recursive), sorted by name.
    pub fn list_directory(&self, path: &Path) -> Result<Vec<DirEntryInfo>, GatewayError> {
        let path = self.policy.check_path(path)?;

        if !path.exists() {
            return Err(GatewayError::NotFound(format!(
                "directory not found: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), "listing directory");
        let entries = fs::read_dir(&path)
            .map_err(|e| GatewayError::Internal(format!("list {}: {e}", path.display())))?;

        let mut items = Vec::new();
        for entry in entries {
            let entry =
                entry.map_err(|e| GatewayError::Internal(format!("list {}: {e}", path.display())))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let metadata = entry
                .metadata()
                .map_err(|e| GatewayError::Internal(format!("stat {name}: {e}")))?;

            let (kind, size) = if metadata.is_dir() {
                (EntryKind::Directory, None)
            } else {
                (EntryKind::File, Some(metadata.len()))
            };
            items.push(DirEntryInfo { name, kind, size });
        }

        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }
}
