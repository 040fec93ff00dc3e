use super::adapter::{AdapterEntry, AdapterMetadata, FsAdapter};
use crate::path::path_history::{PathHistory, Raw};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

#[derive(Debug, Clone)]
enum Node {
    Dir { modified: SystemTime },
    File { data: Vec<u8>, modified: SystemTime },
}

#[derive(Debug)]
struct Tree {
    nodes: BTreeMap<PathBuf, Node>,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            PathBuf::from("/"),
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        Self { nodes }
    }

    fn require_parent_dir(&self, path: &Path) -> io::Result<()> {
        let parent = path.parent().ok_or_else(|| invalid("the root has no parent"))?;
        match self.nodes.get(parent) {
            Some(Node::Dir { .. }) => Ok(()),
            Some(Node::File { .. }) => Err(io::Error::new(
                io::ErrorKind::NotADirectory,
                format!("{} is not a directory", parent.display()),
            )),
            None => Err(not_found(parent)),
        }
    }

    fn file_mut(&mut self, path: &Path) -> io::Result<&mut Vec<u8>> {
        match self.nodes.get_mut(path) {
            Some(Node::File { data, modified }) => {
                *modified = SystemTime::now();
                Ok(data)
            }
            Some(Node::Dir { .. }) => Err(is_dir(path)),
            None => Err(not_found(path)),
        }
    }

    fn put_file(&mut self, path: &Path, data: Vec<u8>) -> io::Result<()> {
        if let Some(Node::Dir { .. }) = self.nodes.get(path) {
            return Err(is_dir(path));
        }
        self.require_parent_dir(path)?;
        self.nodes.insert(
            path.to_path_buf(),
            Node::File {
                data,
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn descendants(&self, path: &Path) -> Vec<PathBuf> {
        self.nodes
            .range(path.to_path_buf()..)
            .take_while(|(key, _)| key.starts_with(path))
            .filter(|(key, _)| key.as_path() != path)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

fn normalize(path: &Path) -> PathBuf {
    PathHistory::<Raw>::new(path).clamp().into_inner()
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

fn is_dir(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::IsADirectory,
        format!("{} is a directory", path.display()),
    )
}

fn invalid(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message.to_string())
}

/// SUMMARY:
/// A thread-safe in-memory filesystem implementing `FsAdapter`.
///
/// DETAILS:
/// Cloning shares the same tree. All paths are normalized into `/` before use.
///
/// EXAMPLE:
/// ```rust
/// # use std::sync::Arc;
/// # use strict_vfs::{Adapter, LockMode, MemoryFs, Storage, WriteMode};
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let fs = Arc::new(MemoryFs::new());
/// let mut file = Adapter::new(fs.clone(), "/notes.txt");
/// file.write(b"hi", WriteMode::Truncate, LockMode::None)?;
/// assert_eq!(file.read(0, None)?, b"hi");
/// # Ok(()) }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFs {
    inner: Arc<RwLock<Tree>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Tree::new())),
        }
    }

    /// Number of entries, including the root directory.
    pub fn len(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

struct MemoryFsWriter {
    inner: Arc<RwLock<Tree>>,
    path: PathBuf,
}

impl Write for MemoryFsWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut tree = self.inner.write();
        tree.file_mut(&self.path)?.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl FsAdapter for MemoryFs {
    fn name(&self) -> &str {
        "memfs"
    }

    fn metadata(&self, path: &Path) -> io::Result<AdapterMetadata> {
        let path = normalize(path);
        let tree = self.inner.read();
        match tree.nodes.get(&path) {
            Some(Node::Dir { modified }) => Ok(AdapterMetadata {
                is_dir: true,
                len: 0,
                modified: Some(*modified),
                readonly: false,
            }),
            Some(Node::File { data, modified }) => Ok(AdapterMetadata {
                is_dir: false,
                len: data.len() as u64,
                modified: Some(*modified),
                readonly: false,
            }),
            None => Err(not_found(&path)),
        }
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let path = normalize(path);
        match self.inner.read().nodes.get(&path) {
            Some(Node::File { data, .. }) => Ok(data.clone()),
            Some(Node::Dir { .. }) => Err(is_dir(&path)),
            None => Err(not_found(&path)),
        }
    }

    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        self.inner.write().put_file(&normalize(path), data.to_vec())
    }

    fn open_write(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let path = normalize(path);
        self.inner.write().put_file(&path, Vec::new())?;
        Ok(Box::new(MemoryFsWriter {
            inner: Arc::clone(&self.inner),
            path,
        }))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.inner.write();
        match tree.nodes.get(&path) {
            Some(Node::File { .. }) => {
                tree.nodes.remove(&path);
                Ok(())
            }
            Some(Node::Dir { .. }) => Err(is_dir(&path)),
            None => Err(not_found(&path)),
        }
    }

    fn read_dir(&self, path: &Path) -> io::Result<Vec<AdapterEntry>> {
        let path = normalize(path);
        let tree = self.inner.read();
        match tree.nodes.get(&path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(&path)),
        }
        Ok(tree
            .nodes
            .iter()
            .filter(|(key, _)| key.parent() == Some(path.as_path()))
            .filter_map(|(key, node)| {
                key.file_name().map(|name| AdapterEntry {
                    name: name.to_os_string(),
                    is_dir: matches!(node, Node::Dir { .. }),
                })
            })
            .collect())
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.inner.write();
        if tree.nodes.contains_key(&path) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ));
        }
        tree.require_parent_dir(&path)?;
        tree.nodes.insert(
            path,
            Node::Dir {
                modified: SystemTime::now(),
            },
        );
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.inner.write();
        let mut chain: Vec<&Path> = path.ancestors().collect();
        chain.reverse();
        for dir in chain {
            match tree.nodes.get(dir) {
                Some(Node::Dir { .. }) => {}
                Some(Node::File { .. }) => {
                    return Err(io::Error::new(
                        io::ErrorKind::NotADirectory,
                        format!("{} is not a directory", dir.display()),
                    ))
                }
                None => {
                    tree.nodes.insert(
                        dir.to_path_buf(),
                        Node::Dir {
                            modified: SystemTime::now(),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.inner.write();
        match tree.nodes.get(&path) {
            Some(Node::Dir { .. }) => {}
            Some(Node::File { .. }) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", path.display()),
                ))
            }
            None => return Err(not_found(&path)),
        }
        if !tree.descendants(&path).is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::DirectoryNotEmpty,
                format!("{} is not empty", path.display()),
            ));
        }
        if path.parent().is_none() {
            return Err(invalid("the root directory cannot be removed"));
        }
        tree.nodes.remove(&path);
        Ok(())
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.inner.write();
        if !matches!(tree.nodes.get(&path), Some(Node::Dir { .. })) {
            return Err(not_found(&path));
        }
        for key in tree.descendants(&path) {
            tree.nodes.remove(&key);
        }
        if path.parent().is_some() {
            tree.nodes.remove(&path);
        }
        Ok(())
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<()> {
        let (from, to) = (normalize(from), normalize(to));
        let mut tree = self.inner.write();
        let data = match tree.nodes.get(&from) {
            Some(Node::File { data, .. }) => data.clone(),
            Some(Node::Dir { .. }) => return Err(is_dir(&from)),
            None => return Err(not_found(&from)),
        };
        tree.put_file(&to, data)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let (from, to) = (normalize(from), normalize(to));
        let mut tree = self.inner.write();
        let node = tree.nodes.get(&from).cloned().ok_or_else(|| not_found(&from))?;
        if from.parent().is_none() || (to.starts_with(&from) && to != from) {
            return Err(invalid("cannot move a directory into itself"));
        }
        if to == from {
            return Ok(());
        }
        tree.require_parent_dir(&to)?;
        // Same replacement rules as a native rename: only files over files and
        // directories over empty directories.
        match (&node, tree.nodes.get(&to)) {
            (Node::File { .. }, Some(Node::Dir { .. })) => return Err(is_dir(&to)),
            (Node::Dir { .. }, Some(Node::File { .. })) => {
                return Err(io::Error::new(
                    io::ErrorKind::NotADirectory,
                    format!("{} is not a directory", to.display()),
                ))
            }
            (Node::Dir { .. }, Some(Node::Dir { .. })) if !tree.descendants(&to).is_empty() => {
                return Err(io::Error::new(
                    io::ErrorKind::DirectoryNotEmpty,
                    format!("{} is not empty", to.display()),
                ))
            }
            _ => {}
        }
        let moved: Vec<PathBuf> = tree.descendants(&from);
        for key in moved {
            if let Some(child) = tree.nodes.remove(&key) {
                if let Ok(rest) = key.strip_prefix(&from) {
                    tree.nodes.insert(to.join(rest), child);
                }
            }
        }
        tree.nodes.remove(&from);
        tree.nodes.insert(to, node);
        Ok(())
    }

    fn touch(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut tree = self.inner.write();
        match tree.nodes.get_mut(&path) {
            Some(Node::Dir { modified }) | Some(Node::File { modified, .. }) => {
                *modified = SystemTime::now();
                Ok(())
            }
            None => tree.put_file(&path, Vec::new()),
        }
    }
}
