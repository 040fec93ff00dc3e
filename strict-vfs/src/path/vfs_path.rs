use super::path_history::{PathHistory, Raw};
use crate::{Result, VfsError};
use std::cell::OnceCell;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// SUMMARY:
/// One component of a `VfsPath`: a literal path string, or another `VfsPath`.
///
/// DETAILS:
/// Storages convert into `PathPart::Path` (see the `From` impls next to each storage type), so a
/// `Disk` or `File` can seed the safe root of a new path.
#[derive(Debug, Clone)]
pub enum PathPart {
    Literal(PathBuf),
    Path(VfsPath),
}

impl From<&str> for PathPart {
    fn from(value: &str) -> Self {
        PathPart::Literal(PathBuf::from(value))
    }
}

impl From<String> for PathPart {
    fn from(value: String) -> Self {
        PathPart::Literal(PathBuf::from(value))
    }
}

impl From<&String> for PathPart {
    fn from(value: &String) -> Self {
        PathPart::Literal(PathBuf::from(value))
    }
}

impl From<&Path> for PathPart {
    fn from(value: &Path) -> Self {
        PathPart::Literal(value.to_path_buf())
    }
}

impl From<PathBuf> for PathPart {
    fn from(value: PathBuf) -> Self {
        PathPart::Literal(value)
    }
}

impl From<&PathBuf> for PathPart {
    fn from(value: &PathBuf) -> Self {
        PathPart::Literal(value.clone())
    }
}

impl From<&OsStr> for PathPart {
    fn from(value: &OsStr) -> Self {
        PathPart::Literal(PathBuf::from(value))
    }
}

impl From<OsString> for PathPart {
    fn from(value: OsString) -> Self {
        PathPart::Literal(PathBuf::from(value))
    }
}

impl From<VfsPath> for PathPart {
    fn from(value: VfsPath) -> Self {
        PathPart::Path(value)
    }
}

impl From<&VfsPath> for PathPart {
    fn from(value: &VfsPath) -> Self {
        PathPart::Path(value.clone())
    }
}

/// Everything derived from the components, computed in one pass and replaced wholesale on reload.
#[derive(Debug)]
struct Snapshot {
    raw: PathBuf,
    real: Option<PathBuf>,
    safe_root: PathBuf,
    directory: Option<PathBuf>,
    filename: Option<OsString>,
    basename: Option<OsString>,
    extension: Option<OsString>,
}

/// SUMMARY:
/// A filesystem location assembled from ordered components, carrying its literal (`raw`) path,
/// its OS-resolved (`real`) path and the safe root it must not escape.
///
/// DETAILS:
/// - The first component seeds the safe root. A `VfsPath` first component passes its own safe
///   root through; a literal one resolves as: existing directory → canonicalized, existing file →
///   canonicalized parent, otherwise the literal as given.
/// - Later components are joined as relative paths (a leading root or prefix is dropped).
/// - Every component but the last contributes only its directory portion: when the path
///   assembled so far names an existing file, its parent directory is used instead.
/// - `..` segments stay in `raw`. `real` is `raw` passed through OS canonicalization only, and is
///   `None` when the target does not exist.
///
/// Resolution is lazy. The first accessor call resolves and caches a snapshot; `reload()` drops
/// it so the next access sees the filesystem as it is now.
///
/// EXAMPLE:
/// ```rust
/// # use strict_vfs::VfsPath;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let root = tempfile::tempdir()?;
/// let path = VfsPath::new([root.path().as_os_str(), "uploads/../../etc/passwd".as_ref()])?;
/// assert!(path.real().is_none());
/// assert_eq!(path.safe_root(), std::fs::canonicalize(root.path())?);
/// # Ok(()) }
/// ```
#[derive(Clone)]
pub struct VfsPath {
    parts: Vec<PathPart>,
    explicit_root: Option<PathBuf>,
    state: OnceCell<Arc<Snapshot>>,
}

impl VfsPath {
    /// SUMMARY:
    /// Build a path from ordered components.
    ///
    /// ERRORS:
    /// - `InvalidValue`: no non-empty component was given, or a component contains a NUL byte.
    pub fn new<I>(parts: I) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<PathPart>,
    {
        let mut collected = Vec::new();
        for part in parts {
            match part.into() {
                PathPart::Literal(literal) => {
                    if literal.as_os_str().is_empty() {
                        continue;
                    }
                    if literal.as_os_str().as_encoded_bytes().contains(&0) {
                        return Err(VfsError::InvalidValue(format!(
                            "path component contains a NUL byte: {}",
                            literal.to_string_lossy()
                        )));
                    }
                    collected.push(PathPart::Literal(normalize_separators(literal)));
                }
                path @ PathPart::Path(_) => collected.push(path),
            }
        }
        if collected.is_empty() {
            return Err(VfsError::InvalidValue(
                "a path needs at least one non-empty component".to_string(),
            ));
        }
        Ok(Self {
            parts: collected,
            explicit_root: None,
            state: OnceCell::new(),
        })
    }

    /// Replaces the inherited safe root. The root is resolved like a literal first component.
    pub fn with_safe_root(mut self, root: impl AsRef<Path>) -> Self {
        self.explicit_root = Some(normalize_separators(root.as_ref().to_path_buf()));
        self.state = OnceCell::new();
        self
    }

    /// A child of this path. The new path inherits this path's safe root.
    pub fn join(&self, child: impl Into<PathPart>) -> Result<Self> {
        Self::new([PathPart::Path(self.clone()), child.into()])
    }

    /// Walks `levels` directories up by appending `..` to `raw`, keeping the safe root.
    pub fn parent(&self, levels: usize) -> Self {
        if levels == 0 {
            return self.clone();
        }
        let mut raw = self.raw().to_path_buf();
        for _ in 0..levels {
            raw.push("..");
        }
        Self {
            parts: vec![PathPart::Literal(raw)],
            explicit_root: Some(self.safe_root().to_path_buf()),
            state: OnceCell::new(),
        }
    }

    /// Drops the resolved snapshot; the components are kept.
    pub fn reload(&mut self) {
        self.state = OnceCell::new();
    }

    /// True when the snapshot is cached.
    pub fn is_resolved(&self) -> bool {
        self.state.get().is_some()
    }

    fn snapshot(&self) -> &Snapshot {
        self.state.get_or_init(|| Arc::new(self.resolve()))
    }

    /// Literal assembled path, possibly containing `..`.
    pub fn raw(&self) -> &Path {
        &self.snapshot().raw
    }

    /// OS-canonicalized path; `None` when the target does not exist.
    pub fn real(&self) -> Option<&Path> {
        self.snapshot().real.as_deref()
    }

    pub fn safe_root(&self) -> &Path {
        &self.snapshot().safe_root
    }

    /// Directory that contains the named entry.
    pub fn directory(&self) -> Option<&Path> {
        self.snapshot().directory.as_deref()
    }

    /// Final component including the extension.
    pub fn filename(&self) -> Option<&OsStr> {
        self.snapshot().filename.as_deref()
    }

    /// Final component without the extension.
    pub fn basename(&self) -> Option<&OsStr> {
        self.snapshot().basename.as_deref()
    }

    pub fn extension(&self) -> Option<&OsStr> {
        self.snapshot().extension.as_deref()
    }

    /// True when `real` is known.
    pub fn exists(&self) -> bool {
        self.real().is_some()
    }

    /// SUMMARY:
    /// `raw` with its existing prefix resolved by the OS and `.`/`..` folded in the missing tail.
    ///
    /// DETAILS:
    /// Touches the filesystem on every call; the result is not cached.
    pub fn lexical(&self) -> std::io::Result<PathBuf> {
        PathHistory::<Raw>::new(self.raw())
            .canonicalize()
            .map(PathHistory::into_inner)
    }

    /// `real` when known, `lexical()` otherwise.
    pub fn location(&self) -> std::io::Result<PathBuf> {
        match self.real() {
            Some(real) => Ok(real.to_path_buf()),
            None => self.lexical(),
        }
    }

    fn resolve(&self) -> Snapshot {
        let mut raw = PathBuf::new();
        let mut safe_root: Option<PathBuf> = None;
        let last = self.parts.len() - 1;
        for (index, part) in self.parts.iter().enumerate() {
            let piece = match part {
                PathPart::Literal(literal) => literal.clone(),
                PathPart::Path(path) => path.raw().to_path_buf(),
            };
            if index == 0 {
                safe_root = Some(match part {
                    PathPart::Path(path) => path.safe_root().to_path_buf(),
                    PathPart::Literal(literal) => root_from_literal(literal),
                });
                raw = piece;
            } else {
                raw.push(strip_root(&piece));
            }
            if index != last && raw.is_file() {
                if let Some(parent) = raw.parent() {
                    raw = parent.to_path_buf();
                }
            }
        }

        let safe_root = match &self.explicit_root {
            Some(root) => root_from_literal(root),
            None => safe_root.unwrap_or_default(),
        };
        let real = PathHistory::<Raw>::new(&raw)
            .resolve()
            .map(PathHistory::into_inner);

        // `..`/`.` at the end has no name of its own; name the folded location instead.
        let named = match raw.file_name() {
            Some(_) => raw.clone(),
            None => PathHistory::<Raw>::new(&raw)
                .canonicalize()
                .map(PathHistory::into_inner)
                .unwrap_or_else(|_| raw.clone()),
        };

        tracing::trace!(raw = %raw.display(), real = ?real, safe_root = %safe_root.display(), "resolved path");
        Snapshot {
            directory: named.parent().map(Path::to_path_buf),
            filename: named.file_name().map(OsStr::to_os_string),
            basename: named.file_stem().map(OsStr::to_os_string),
            extension: named.extension().map(OsStr::to_os_string),
            raw,
            real,
            safe_root,
        }
    }
}

fn root_from_literal(literal: &Path) -> PathBuf {
    if literal.is_dir() {
        if let Some(resolved) = PathHistory::<Raw>::new(literal).resolve() {
            return resolved.into_inner();
        }
    } else if literal.is_file() {
        if let Some(resolved) = PathHistory::<Raw>::new(literal).resolve() {
            if let Some(parent) = resolved.parent() {
                return parent.to_path_buf();
            }
        }
    }
    literal.to_path_buf()
}

fn strip_root(piece: &Path) -> PathBuf {
    piece
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

#[cfg(unix)]
fn normalize_separators(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(text) if text.contains('\\') => PathBuf::from(text.replace('\\', "/")),
        _ => path,
    }
}

#[cfg(windows)]
fn normalize_separators(path: PathBuf) -> PathBuf {
    match path.to_str() {
        Some(text) if text.contains('/') => PathBuf::from(text.replace('/', "\\")),
        _ => path,
    }
}

impl fmt::Debug for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VfsPath")
            .field("raw", &self.raw())
            .field("real", &self.real())
            .field("safe_root", &self.safe_root())
            .finish()
    }
}

impl fmt::Display for VfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw().display())
    }
}

impl AsRef<Path> for VfsPath {
    #[inline]
    fn as_ref(&self) -> &Path {
        self.raw()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for VfsPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw().to_string_lossy())
    }
}
