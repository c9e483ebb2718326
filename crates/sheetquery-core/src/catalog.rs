//! The data directory that requests name files in.

use std::path::{Component, Path, PathBuf};

use crate::error::{QueryError, Result};

/// A directory of spreadsheet files addressed by bare file name.
#[derive(Clone, Debug)]
pub struct Catalog {
    root: PathBuf,
}

impl Catalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Names of the regular files directly under the root, sorted.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    /// Resolve a file name to a path under the root.
    ///
    /// Anything other than a single normal path component is reported as
    /// not found.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let mut components = Path::new(name).components();
        let single = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if !single || name.contains(['/', '\\']) {
            return Err(QueryError::not_found(name));
        }
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(QueryError::not_found(name));
        }
        Ok(path)
    }
}
