//! Document store trait and in-memory implementation.

use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, RwLock};

/// Result of a point read against a [`Store`].
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
  path: String,
  value: Option<Value>,
}

impl Snapshot {
  /// A `null` value counts as missing.
  pub fn new(path: impl Into<String>, value: Option<Value>) -> Self {
    Self {
      path: path.into(),
      value: value.filter(|v| !v.is_null()),
    }
  }

  pub fn missing(path: impl Into<String>) -> Self {
    Self::new(path, None)
  }

  pub fn path(&self) -> &str {
    &self.path
  }

  pub fn exists(&self) -> bool {
    self.value.is_some()
  }

  pub fn value(&self) -> Option<&Value> {
    self.value.as_ref()
  }

  pub fn into_value(self) -> Option<Value> {
    self.value
  }

  /// Decode the value into `T`. Missing snapshots decode to `None`.
  pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>> {
    self
      .value
      .as_ref()
      .map(|v| {
        serde_json::from_value(v.clone())
          .map_err(|e| eyre!("Failed to decode value at '{}': {}", self.path, e))
      })
      .transpose()
  }
}

/// Path-addressed document store.
///
/// Paths are `/`-separated; the empty path is the root.
pub trait Store: Send + Sync + 'static {
  /// Point read of the value at `path`.
  fn read(&self, path: &str) -> impl Future<Output = Result<Snapshot>> + Send;
}

impl<S: Store> Store for Arc<S> {
  fn read(&self, path: &str) -> impl Future<Output = Result<Snapshot>> + Send {
    (**self).read(path)
  }
}

/// JSON tree held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
  root: RwLock<Value>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::from_value(Value::Null)
  }

  pub fn from_value(root: Value) -> Self {
    Self {
      root: RwLock::new(root),
    }
  }

  pub fn from_json_str(json: &str) -> Result<Self> {
    let root: Value =
      serde_json::from_str(json).map_err(|e| eyre!("Failed to parse store document: {}", e))?;
    Ok(Self::from_value(root))
  }

  /// Load the whole tree from a JSON file.
  pub fn from_file(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read store file {}: {}", path.display(), e))?;
    Self::from_json_str(&contents)
  }

  /// Synchronous read used by the [`Store`] impl.
  pub fn get(&self, path: &str) -> Snapshot {
    let root = self.root.read().unwrap_or_else(|e| e.into_inner());

    let mut current = &*root;
    for segment in segments(path) {
      match current.get(segment) {
        Some(child) => current = child,
        None => return Snapshot::missing(path),
      }
    }

    Snapshot::new(path, Some(current.clone()))
  }

  /// Replace the subtree at `path`, creating parents as needed.
  ///
  /// Writing `null` removes the entry.
  pub fn write(&self, path: &str, value: Value) {
    let mut root = self.root.write().unwrap_or_else(|e| e.into_inner());
    let parts: Vec<&str> = segments(path).collect();

    let Some((last, parents)) = parts.split_last() else {
      *root = value;
      return;
    };

    let mut current = &mut *root;
    for segment in parents {
      current = ensure_object(current)
        .entry(segment.to_string())
        .or_insert(Value::Null);
    }

    let object = ensure_object(current);
    if value.is_null() {
      object.remove(*last);
    } else {
      object.insert(last.to_string(), value);
    }
  }

  /// Shallow merge: each field is written under `path`, other children are
  /// left alone.
  pub fn update(&self, path: &str, fields: Map<String, Value>) {
    for (key, value) in fields {
      self.write(&join(path, &key), value);
    }
  }

  pub fn remove(&self, path: &str) {
    self.write(path, Value::Null);
  }
}

impl Store for MemoryStore {
  fn read(&self, path: &str) -> impl Future<Output = Result<Snapshot>> + Send {
    futures::future::ready(Ok(self.get(path)))
  }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
  path.split('/').filter(|s| !s.is_empty())
}

fn join(path: &str, key: &str) -> String {
  let base = path.trim_end_matches('/');
  if base.is_empty() {
    key.to_string()
  } else {
    format!("{}/{}", base, key)
  }
}

/// Turn `value` into an object if it is anything else.
fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
  if !value.is_object() {
    *value = Value::Object(Map::new());
  }
  match value {
    Value::Object(map) => map,
    _ => unreachable!("value was just replaced with an object"),
  }
}
