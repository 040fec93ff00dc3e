use crate::path::path_history::{PathHistory, Raw};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Environment variable holding the process-wide allow-list, in the OS path-list syntax
/// (`:`-separated on Unix, `;`-separated on Windows).
pub const ALLOWED_ROOTS_ENV: &str = "STRICT_VFS_ALLOWED_ROOTS";

static GLOBAL: OnceLock<AllowedRoots> = OnceLock::new();

/// SUMMARY:
/// Directories that paths checked with `IN_ALLOWED_ROOTS` must stay under.
///
/// DETAILS:
/// Roots are resolved once at construction (existing prefix through the OS, missing tail folded).
/// An empty list places no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedRoots {
    roots: Vec<PathBuf>,
}

impl AllowedRoots {
    pub fn new<I, P>(roots: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .filter(|root| !root.as_ref().as_os_str().is_empty())
            .map(|root| {
                let root = root.as_ref();
                PathHistory::<Raw>::new(root)
                    .canonicalize()
                    .map(PathHistory::into_inner)
                    .unwrap_or_else(|_| root.to_path_buf())
            })
            .collect();
        Self { roots }
    }

    /// Parses an OS path list such as the value of `STRICT_VFS_ALLOWED_ROOTS`.
    pub fn parse(list: &OsStr) -> Self {
        Self::new(std::env::split_paths(list))
    }

    /// Reads `STRICT_VFS_ALLOWED_ROOTS`; an unset variable yields an empty list.
    pub fn from_env() -> Self {
        match std::env::var_os(ALLOWED_ROOTS_ENV) {
            Some(list) => Self::parse(&list),
            None => Self::default(),
        }
    }

    /// The process-wide list, read from the environment on first use and cached for the
    /// lifetime of the process.
    pub fn global() -> &'static AllowedRoots {
        GLOBAL.get_or_init(|| {
            let roots = Self::from_env();
            tracing::debug!(count = roots.roots.len(), "loaded allowed roots");
            roots
        })
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// True when `location` equals or descends from one of the roots, or the list is empty.
    pub fn permits(&self, location: &Path) -> bool {
        self.is_empty() || self.roots.iter().any(|root| location.starts_with(root))
    }
}
