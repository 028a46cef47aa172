pub mod memory;
pub mod path;

use std::io::{Read, Write};
use chrono::{DateTime, Utc};
use serde::Serialize;
use crate::error::{Error, Result};

pub trait VfsBasicMeta {
    fn name(&self) -> &str;
    fn size(&self) -> u64;  // in bytes
    fn last_modified(&self) -> Option<DateTime<Utc>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryInfo {
    pub name: String,
    /// Path relative to the client root.
    pub path: String,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Remote object id, when the backend has one.
    pub id: Option<String>,
}

impl EntryInfo {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}

impl VfsBasicMeta for EntryInfo {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}

/// A destination opened for binary write. Bytes are only guaranteed to be
/// stored once `close` returns `Ok`.
pub trait FileWriter: Write + Send {
    fn close(self: Box<Self>) -> Result<()>;
}

/// # Client contract
/// Path-addressable operations of an underlying storage client.
/// Paths are relative to the client root, `""` is the root itself.
pub trait VfsClient: Send + Sync {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>>;

    fn open_write(&self, path: &str) -> Result<Box<dyn FileWriter>>;

    fn list(&self, path: &str) -> Result<Vec<EntryInfo>>;

    fn info(&self, path: &str) -> Result<EntryInfo>;

    fn exists(&self, path: &str) -> Result<bool> {
        match self.info(path) {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// `create_parents` creates missing intermediate directories,
    /// `exist_ok` tolerates an existing directory at `path`.
    fn mkdir(&self, path: &str, create_parents: bool, exist_ok: bool) -> Result<()>;

    fn remove(&self, path: &str, recursive: bool) -> Result<()>;
}
