pub(crate) mod path_history;
pub mod vfs_path;

pub use vfs_path::{PathPart, VfsPath};

#[cfg(test)]
mod tests;
