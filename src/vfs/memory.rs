use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use chrono::Utc;
use crate::error::{Error, Result};
use crate::vfs::path::{components, join, split_parent};
use crate::vfs::{EntryInfo, EntryKind, FileWriter, VfsClient};

enum Node {
    Dir,
    File(Vec<u8>),
}

type Tree = BTreeMap<String, Node>;

/// In-process client with the same error semantics as the Box driver:
/// writes need an existing parent, mkdir without `exist_ok` refuses
/// existing paths.
#[derive(Clone, Default)]
pub struct MemoryFs {
    tree: Arc<Mutex<Tree>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tree> {
        self.tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn normalize(path: &str) -> String {
    components(path).collect::<Vec<_>>().join("/")
}

fn is_dir(tree: &Tree, path: &str) -> bool {
    path.is_empty() || matches!(tree.get(path), Some(Node::Dir))
}

fn entry(path: &str, node: &Node) -> EntryInfo {
    let (_, name) = split_parent(path);
    let (kind, size) = match node {
        Node::Dir => (EntryKind::Dir, 0),
        Node::File(data) => (EntryKind::File, data.len() as u64),
    };
    EntryInfo {
        name: name.to_owned(),
        path: path.to_owned(),
        kind,
        size,
        modified: None,
        id: None,
    }
}

fn is_child(parent: &str, candidate: &str) -> bool {
    if candidate.is_empty() || candidate == parent {
        return false;
    }
    let (candidate_parent, _) = split_parent(candidate);
    candidate_parent == parent
}

struct MemoryWriter {
    tree: Arc<Mutex<Tree>>,
    path: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl FileWriter for MemoryWriter {
    fn close(self: Box<Self>) -> Result<()> {
        let MemoryWriter { tree, path, buffer } = *self;
        let mut tree = tree.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let (parent, _) = split_parent(&path);
        if !is_dir(&tree, parent) {
            return Err(Error::NotFound(parent.to_owned()));
        }
        tree.insert(path, Node::File(buffer));
        Ok(())
    }
}

impl VfsClient for MemoryFs {
    fn open_read(&self, path: &str) -> Result<Box<dyn Read + Send>> {
        let path = normalize(path);
        match self.lock().get(&path) {
            Some(Node::File(data)) => Ok(Box::new(Cursor::new(data.clone()))),
            Some(Node::Dir) => Err(Error::IsADirectory(path)),
            None if path.is_empty() => Err(Error::IsADirectory(path)),
            None => Err(Error::NotFound(path)),
        }
    }

    fn open_write(&self, path: &str) -> Result<Box<dyn FileWriter>> {
        let path = normalize(path);
        let tree = self.lock();
        if is_dir(&tree, &path) {
            return Err(Error::IsADirectory(path));
        }
        let (parent, _) = split_parent(&path);
        if !is_dir(&tree, parent) {
            return Err(Error::NotFound(parent.to_owned()));
        }
        Ok(Box::new(MemoryWriter {
            tree: self.tree.clone(),
            path,
            buffer: Vec::new(),
        }))
    }

    fn list(&self, path: &str) -> Result<Vec<EntryInfo>> {
        let path = normalize(path);
        let tree = self.lock();
        match tree.get(&path) {
            Some(Node::File(_)) => return Err(Error::NotADirectory(path)),
            None if !path.is_empty() => return Err(Error::NotFound(path)),
            _ => {}
        }
        Ok(tree.iter()
            .filter(|(candidate, _)| is_child(&path, candidate))
            .map(|(candidate, node)| entry(candidate, node))
            .collect())
    }

    fn info(&self, path: &str) -> Result<EntryInfo> {
        let path = normalize(path);
        if path.is_empty() {
            return Ok(entry("", &Node::Dir));
        }
        match self.lock().get(&path) {
            Some(node) => {
                let mut info = entry(&path, node);
                info.modified = Some(Utc::now());
                Ok(info)
            }
            None => Err(Error::NotFound(path)),
        }
    }

    fn mkdir(&self, path: &str, create_parents: bool, exist_ok: bool) -> Result<()> {
        let path = normalize(path);
        let mut tree = self.lock();
        if is_dir(&tree, &path) {
            return if exist_ok { Ok(()) } else { Err(Error::AlreadyExists(path)) };
        }
        if tree.contains_key(&path) {
            return Err(Error::AlreadyExists(path));
        }
        let mut current = String::new();
        for part in components(&path) {
            current = join(&current, part);
            match tree.get(&current) {
                Some(Node::Dir) => continue,
                Some(Node::File(_)) => return Err(Error::NotADirectory(current)),
                None if current == path || create_parents => {
                    tree.insert(current.clone(), Node::Dir);
                }
                None => return Err(Error::NotFound(current)),
            }
        }
        Ok(())
    }

    fn remove(&self, path: &str, recursive: bool) -> Result<()> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(Error::InvalidPath("refusing to remove the root".to_owned()));
        }
        let mut tree = self.lock();
        match tree.get(&path) {
            None => Err(Error::NotFound(path)),
            Some(Node::File(_)) => {
                tree.remove(&path);
                Ok(())
            }
            Some(Node::Dir) => {
                let prefix = format!("{}/", path);
                let nested: Vec<String> = tree.range(prefix.clone()..)
                    .take_while(|(key, _)| key.starts_with(&prefix))
                    .map(|(key, _)| key.clone())
                    .collect();
                if !nested.is_empty() && !recursive {
                    return Err(Error::Api { status: 409, message: format!("directory '{}' is not empty", path) });
                }
                for key in nested {
                    tree.remove(&key);
                }
                tree.remove(&path);
                Ok(())
            }
        }
    }
}
