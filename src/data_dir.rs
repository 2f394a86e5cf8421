use std::{
    fmt,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Environment variable overriding the default data directory.
pub const DATA_DIR_ENV: &str = "LECTERN_DATA_DIR";

const STORE_FILE: &str = "documents.redb";
const INDEX_DIR: &str = "tantivy";

/// Where a [`DataDir`] location came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataDirSource {
    Explicit,
    Environment,
    Xdg,
}

impl fmt::Display for DataDirSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataDirSource::Explicit => "--data-dir",
            DataDirSource::Environment => DATA_DIR_ENV,
            DataDirSource::Xdg => "xdg",
        })
    }
}

/// The directory holding the document store and the on-disk index.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
    source: DataDirSource,
}

impl DataDir {
    /// Pick the data directory and make sure it exists.
    ///
    /// An explicit path wins over [`DATA_DIR_ENV`], which wins over the XDG
    /// data home (`~/.local/share/lectern`).
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        let (root, source) = match explicit {
            Some(path) => (path.to_path_buf(), DataDirSource::Explicit),
            None => match std::env::var_os(DATA_DIR_ENV) {
                Some(val) if !val.is_empty() => {
                    (PathBuf::from(val), DataDirSource::Environment)
                }
                _ => (xdg_data_home()?, DataDirSource::Xdg),
            },
        };

        ensure_dir(&root)?;
        Ok(Self { root, source })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source(&self) -> DataDirSource {
        self.source
    }

    pub fn documents_db(&self) -> PathBuf {
        self.root.join(STORE_FILE)
    }

    /// The index directory, created on first use.
    pub fn tantivy_dir(&self) -> Result<PathBuf> {
        let path = self.root.join(INDEX_DIR);
        ensure_dir(&path)?;
        Ok(path)
    }
}

fn xdg_data_home() -> Result<PathBuf> {
    xdg::BaseDirectories::with_prefix("lectern")
        .get_data_home()
        .ok_or_else(|| Error::Config("no XDG data home for this user".into()))
}

fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|_| Error::DataDir(path.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = DataDir::resolve(Some(tmp.path())).unwrap();

        assert_eq!(dir.root(), tmp.path());
        assert_eq!(dir.source(), DataDirSource::Explicit);
        assert_eq!(dir.documents_db(), tmp.path().join("documents.redb"));
    }

    #[test]
    fn missing_directories_are_created() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let dir = DataDir::resolve(Some(&nested)).unwrap();
        assert!(dir.root().is_dir());

        let index = dir.tantivy_dir().unwrap();
        assert!(index.is_dir());
        assert_eq!(index, nested.join("tantivy"));
    }

    #[test]
    fn unusable_path_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("occupied");
        std::fs::write(&file, "").unwrap();

        let err = DataDir::resolve(Some(&file.join("sub"))).unwrap_err();
        assert!(matches!(err, Error::DataDir(_)));
    }
}
