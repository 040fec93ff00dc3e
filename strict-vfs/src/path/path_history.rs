use soft_canonicalize::soft_canonicalize;
use std::ffi::OsString;
use std::io;
use std::marker::PhantomData;
use std::ops::Deref;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Raw;
/// Resolved by the OS; the target exists.
#[derive(Debug, Clone)]
pub struct Resolved;
/// Resolved by `soft_canonicalize`; the tail may not exist.
#[derive(Debug, Clone)]
pub struct Canonicalized;
#[derive(Debug, Clone)]
pub struct Clamped;
#[derive(Debug, Clone)]
pub struct BoundaryChecked;

/// Marker for states whose path is absolute and free of `.`/`..`.
pub trait Settled {}
impl Settled for Resolved {}
impl Settled for Canonicalized {}

#[derive(Debug, Clone)]
pub struct PathHistory<History> {
    inner: PathBuf,
    _marker: PhantomData<History>,
}

impl<H> AsRef<Path> for PathHistory<H> {
    #[inline]
    fn as_ref(&self) -> &Path {
        &self.inner
    }
}

impl<H> Deref for PathHistory<H> {
    type Target = Path;
    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl PathHistory<Raw> {
    #[inline]
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        PathHistory {
            inner: path.into(),
            _marker: PhantomData,
        }
    }
}

impl<H> PathHistory<H> {
    #[inline]
    pub fn into_inner(self) -> PathBuf {
        self.inner
    }

    #[inline]
    fn advance<N>(inner: PathBuf) -> PathHistory<N> {
        PathHistory {
            inner,
            _marker: PhantomData,
        }
    }

    /// OS canonicalization. `None` when the target does not exist (or cannot be resolved).
    pub fn resolve(self) -> Option<PathHistory<(H, Resolved)>> {
        std::fs::canonicalize(&self.inner)
            .ok()
            .map(Self::advance)
    }

    /// Resolves the existing prefix through the OS and folds `.`/`..` in the missing tail.
    pub fn canonicalize(self) -> io::Result<PathHistory<(H, Canonicalized)>> {
        soft_canonicalize(&self.inner).map(Self::advance)
    }

    /// Clamps this path into a virtual root `/`.
    ///
    /// Semantics:
    /// - `..` never walks above the virtual root; extra `..` are dropped.
    /// - Root and prefix components reset to the virtual root.
    /// - No filesystem access; symlinks are not resolved.
    pub fn clamp(self) -> PathHistory<(H, Clamped)> {
        let mut parts: Vec<OsString> = Vec::new();
        for comp in self.inner.components() {
            match comp {
                Component::Normal(name) => parts.push(name.to_os_string()),
                Component::CurDir => {}
                Component::ParentDir => {
                    parts.pop();
                }
                Component::RootDir | Component::Prefix(_) => parts.clear(),
            }
        }
        let mut clamped = PathBuf::from("/");
        clamped.extend(parts);
        Self::advance(clamped)
    }
}

impl<H, S: Settled> PathHistory<(H, S)> {
    /// Succeeds when this path equals or descends from `root`; hands `self` back otherwise.
    #[inline]
    pub fn boundary_check(
        self,
        root: &Path,
    ) -> std::result::Result<PathHistory<((H, S), BoundaryChecked)>, Self> {
        if !self.starts_with(root) {
            return Err(self);
        }
        Ok(Self::advance(self.inner))
    }
}
