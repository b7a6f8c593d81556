//! Persistent key/value storage for relay hooks.
//!
//! Mirrors the browser's local storage: string keys, string values, no
//! expiry. [`FileStorage`] keeps the whole map in one JSON object file and
//! rewrites it on every change.

use std::{
  cell::RefCell,
  collections::BTreeMap,
  fs,
  io,
  path::{
    Path,
    PathBuf,
  },
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
  #[error("failed to read storage file {path}: {source}")]
  Read {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("failed to write storage file {path}: {source}")]
  Write {
    path:   PathBuf,
    #[source]
    source: io::Error,
  },
  #[error("storage file {path} is not a JSON object of strings: {source}")]
  Malformed {
    path:   PathBuf,
    #[source]
    source: serde_json::Error,
  },
  #[error("failed to encode storage: {0}")]
  Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

pub trait Storage {
  fn get_item(&self, key: &str) -> Result<Option<String>>;
  fn set_item(&self, key: &str, value: &str) -> Result<()>;
  fn remove_item(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
  items: RefCell<BTreeMap<String, String>>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.items.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.borrow().is_empty()
  }

  pub fn snapshot(&self) -> BTreeMap<String, String> {
    self.items.borrow().clone()
  }
}

impl Storage for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    Ok(self.items.borrow().get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    self
      .items
      .borrow_mut()
      .insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    self.items.borrow_mut().remove(key);
    Ok(())
  }
}

#[derive(Debug)]
pub struct FileStorage {
  path:  PathBuf,
  items: RefCell<BTreeMap<String, String>>,
}

impl FileStorage {
  /// Open the storage file at `path`. A missing file is an empty store; it is
  /// created on the first write.
  pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
    let path = path.into();
    let items = match fs::read_to_string(&path) {
      Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
      Ok(contents) => {
        serde_json::from_str(&contents).map_err(|source| {
          StorageError::Malformed {
            path: path.clone(),
            source,
          }
        })?
      },
      Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
      Err(source) => return Err(StorageError::Read { path, source }),
    };
    tracing::debug!(path = %path.display(), items = items.len(), "opened storage file");
    Ok(Self {
      path,
      items: RefCell::new(items),
    })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Write `items` to disk. The in-memory map is only replaced once the
  /// write succeeded, so a failed write leaves memory matching the file.
  fn commit(&self, items: BTreeMap<String, String>) -> Result<()> {
    let contents = serde_json::to_string_pretty(&items)?;
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      fs::create_dir_all(parent).map_err(|source| {
        StorageError::Write {
          path: self.path.clone(),
          source,
        }
      })?;
    }
    fs::write(&self.path, contents).map_err(|source| {
      StorageError::Write {
        path: self.path.clone(),
        source,
      }
    })?;
    *self.items.borrow_mut() = items;
    Ok(())
  }
}

impl Storage for FileStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    Ok(self.items.borrow().get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut items = self.items.borrow().clone();
    if items.insert(key.to_string(), value.to_string()).as_deref() == Some(value) {
      return Ok(());
    }
    self.commit(items)
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let mut items = self.items.borrow().clone();
    if items.remove(key).is_none() {
      return Ok(());
    }
    self.commit(items)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn memory_storage_set_get_remove() {
    let storage = MemoryStorage::new();
    assert_eq!(storage.get_item("a").unwrap(), None);

    storage.set_item("a", "1").unwrap();
    storage.set_item("a", "2").unwrap();
    assert_eq!(storage.get_item("a").unwrap().as_deref(), Some("2"));
    assert_eq!(storage.len(), 1);

    storage.remove_item("a").unwrap();
    storage.remove_item("a").unwrap();
    assert!(storage.is_empty());
  }

  #[test]
  fn file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("storage.json");

    let storage = FileStorage::open(&path).unwrap();
    assert_eq!(storage.get_item("sg_host").unwrap(), None);
    storage.set_item("sg_host", "localhost").unwrap();
    storage.set_item("sg_port", "4000").unwrap();
    storage.remove_item("sg_port").unwrap();
    drop(storage);

    let reopened = FileStorage::open(&path).unwrap();
    assert_eq!(
      reopened.get_item("sg_host").unwrap().as_deref(),
      Some("localhost")
    );
    assert_eq!(reopened.get_item("sg_port").unwrap(), None);
  }

  #[test]
  fn malformed_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("storage.json");
    fs::write(&path, "[1, 2]").unwrap();

    let err = FileStorage::open(&path).unwrap_err();
    assert!(matches!(err, StorageError::Malformed { .. }));
  }

  #[test]
  fn failed_write_is_not_committed() {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("state");
    let path = parent.join("storage.json");
    let storage = FileStorage::open(&path).unwrap();

    // A file where the parent directory should be makes every write fail.
    fs::write(&parent, "").unwrap();
    let err = storage.set_item("sg_host", "localhost").unwrap_err();
    assert!(matches!(err, StorageError::Write { .. }));
    assert_eq!(storage.get_item("sg_host").unwrap(), None);

    fs::remove_file(&parent).unwrap();
    storage.set_item("sg_host", "localhost").unwrap();
    assert!(path.exists());
    let reopened = FileStorage::open(&path).unwrap();
    assert_eq!(
      reopened.get_item("sg_host").unwrap().as_deref(),
      Some("localhost")
    );
  }

  #[test]
  fn failed_remove_keeps_the_item() {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("state");
    let path = parent.join("storage.json");
    let storage = FileStorage::open(&path).unwrap();
    storage.set_item("sg_port", "4000").unwrap();

    fs::remove_dir_all(&parent).unwrap();
    fs::write(&parent, "").unwrap();
    assert!(storage.remove_item("sg_port").is_err());
    assert_eq!(storage.get_item("sg_port").unwrap().as_deref(), Some("4000"));

    fs::remove_file(&parent).unwrap();
    storage.remove_item("sg_port").unwrap();
    assert_eq!(FileStorage::open(&path).unwrap().get_item("sg_port").unwrap(), None);
  }

  #[test]
  fn empty_file_is_an_empty_store() {
    let file = tempfile::NamedTempFile::new().unwrap();
    let storage = FileStorage::open(file.path()).unwrap();
    assert_eq!(storage.get_item("x").unwrap(), None);
  }
}
