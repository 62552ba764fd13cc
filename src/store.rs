//! File-store collaborator boundary.
//!
//! The pipeline only ever asks a store for raw bytes by name; where those
//! bytes live is the store's business. Remote providers (Box, Drive, S3)
//! plug in behind [`FileStore`]; the crate ships a local-directory
//! implementation, which is what the CLI uses.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::debug;

use crate::error::QueryError;

pub trait FileStore {
    /// Fetches the full contents of `name`, or `NotFound` when the store has
    /// no such file. Transport failures propagate with their own detail.
    fn fetch(&self, name: &str) -> Result<Vec<u8>, QueryError>;

    /// Lists the file names the store can currently serve.
    fn list(&self) -> Result<Vec<String>, QueryError>;
}

/// Store backed by a flat local directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStore for DirectoryStore {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, QueryError> {
        let path = self.root.join(name);
        if !path.is_file() {
            return Err(QueryError::NotFound {
                name: name.to_string(),
            });
        }
        debug!("fetching '{name}' from {path:?}");
        Ok(fs::read(&path)?)
    }

    fn list(&self) -> Result<Vec<String>, QueryError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.file_type()?.is_file()
                && let Some(name) = entry.file_name().to_str()
            {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use tempfile::tempdir;

    #[test]
    fn fetch_returns_bytes_for_existing_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("report.csv");
        let mut file = fs::File::create(&path).expect("create file");
        file.write_all(b"A,B\n1,2\n").expect("write file");

        let store = DirectoryStore::new(dir.path());
        let bytes = store.fetch("report.csv").expect("fetch");
        assert_eq!(bytes, b"A,B\n1,2\n");
    }

    #[test]
    fn fetch_missing_file_is_not_found() {
        let dir = tempdir().expect("temp dir");
        let store = DirectoryStore::new(dir.path());
        match store.fetch("absent.csv") {
            Err(QueryError::NotFound { name }) => assert_eq!(name, "absent.csv"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn list_returns_sorted_file_names() {
        let dir = tempdir().expect("temp dir");
        fs::write(dir.path().join("b.csv"), "x").expect("write b");
        fs::write(dir.path().join("a.csv"), "x").expect("write a");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");

        let store = DirectoryStore::new(dir.path());
        assert_eq!(store.list().expect("list"), vec!["a.csv", "b.csv"]);
    }
}
