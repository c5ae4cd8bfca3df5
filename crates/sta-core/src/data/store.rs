//! Dataset retrieval.
//!
//! A data store resolves `(dataset, filename)` to a readable source. The
//! contents are treated as already validated by whoever published them;
//! parsing errors are still reported with file context.

use sta_common::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

/// Source of named dataset files.
pub trait DataStore {
    /// Open `filename` within `dataset`.
    fn open(&self, dataset: &str, filename: &str) -> Result<Box<dyn Read>>;

    /// Human-readable location of a file, for error messages.
    fn describe(&self, dataset: &str, filename: &str) -> String {
        format!("{}/{}", dataset, filename)
    }
}

/// A store rooted at a local directory: `root/<dataset>/<filename>`.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, dataset: &str, filename: &str) -> PathBuf {
        self.root.join(dataset).join(filename)
    }
}

impl DataStore for DirectoryStore {
    fn open(&self, dataset: &str, filename: &str) -> Result<Box<dyn Read>> {
        if dataset.contains("..") || filename.contains("..") {
            return Err(Error::Config(format!(
                "dataset paths may not leave the store: {}/{}",
                dataset, filename
            )));
        }
        let path = self.path_for(dataset, filename);
        let file = File::open(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn describe(&self, dataset: &str, filename: &str) -> String {
        self.path_for(dataset, filename).display().to_string()
    }
}
