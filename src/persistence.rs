//! Load-or-default persistence for named configuration objects.
//!
//! Every configuration object oct keeps between invocations lives in its own
//! YAML file under the configuration root. [`load_configuration`] reads the
//! file when it exists and manufactures a default otherwise. Either way the
//! caller receives a [`Persisted`] value, which is also the obligation to
//! write the object back out: it is discharged once, explicitly through
//! [`SaveObligation::discharge`] or implicitly when the value is dropped.
//!
//! # On-disk format
//!
//! Documents always start with an explicit `---` marker and use block style
//! only. YAML has no block form for an empty collection, so `serde_yaml`
//! would render one as flow-style `{}`/`[]`. [`to_document`] writes every
//! nested empty collection as null instead; objects must deserialize null
//! wherever they may hold an empty collection.

use std::fmt;
use std::fs;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use tracing::{debug, error};

use crate::error::{OctError, Result};

const DOCUMENT_START: &str = "---";

/// Marker for types that can be persisted as a named configuration object.
pub trait ConfigurationObject: Serialize + DeserializeOwned {}

impl<T: Serialize + DeserializeOwned> ConfigurationObject for T {}

/// A pending write of one configuration object to its file.
///
/// Object safe so the facade can hold heterogeneous obligations in one list.
pub trait SaveObligation {
    /// Destination file of the write.
    fn path(&self) -> &Path;

    /// Whether the write has already been attempted.
    fn is_discharged(&self) -> bool;

    /// Write the object out. Later calls are no-ops.
    fn discharge(&mut self) -> Result<()>;
}

/// A configuration object paired with the file it is saved to.
///
/// Dereferences to the wrapped object. If the obligation has not been
/// discharged when the value is dropped, the object is written during
/// `Drop`; failures at that point can only be logged.
pub struct Persisted<T: ConfigurationObject> {
    value: T,
    path: PathBuf,
    is_new: bool,
    discharged: bool,
}

impl<T: ConfigurationObject> Persisted<T> {
    /// True when the object was default-constructed because no file existed.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    /// Borrow the wrapped object.
    pub fn inner(&self) -> &T {
        &self.value
    }

    /// Mutably borrow the wrapped object.
    pub fn inner_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: ConfigurationObject> SaveObligation for Persisted<T> {
    fn path(&self) -> &Path {
        &self.path
    }

    fn is_discharged(&self) -> bool {
        self.discharged
    }

    fn discharge(&mut self) -> Result<()> {
        if self.discharged {
            return Ok(());
        }
        // One attempt only, even if the write fails.
        self.discharged = true;
        save_configuration(&self.value, &self.path)
    }
}

impl<T: ConfigurationObject> Deref for Persisted<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: ConfigurationObject> DerefMut for Persisted<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: ConfigurationObject + fmt::Debug> fmt::Debug for Persisted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persisted")
            .field("path", &self.path)
            .field("is_new", &self.is_new)
            .field("discharged", &self.discharged)
            .field("value", &self.value)
            .finish()
    }
}

impl<T: ConfigurationObject> Drop for Persisted<T> {
    fn drop(&mut self) {
        if self.discharged {
            return;
        }
        debug!("Saving {:?} on drop", self.path);
        if let Err(e) = self.discharge() {
            error!("Failed to save configuration to {:?}: {}", self.path, e);
        }
    }
}

/// Load a configuration object from `path`, falling back to `default()`
/// when no file exists.
///
/// A file that exists but cannot be read or parsed is an error; the default
/// is never substituted for it, so a user's customised file is not lost.
pub fn load_configuration<T, F>(path: impl Into<PathBuf>, default: F) -> Result<Persisted<T>>
where
    T: ConfigurationObject,
    F: FnOnce() -> T,
{
    let path = path.into();

    let (value, is_new) = if path.exists() {
        let content = fs::read_to_string(&path)?;
        let value = serde_yaml::from_str(&content).map_err(|source| OctError::Deserialize {
            path: path.clone(),
            source,
        })?;
        debug!("Loaded configuration from {:?}", path);
        (value, false)
    } else {
        debug!("No configuration at {:?}, using defaults", path);
        (default(), true)
    };

    Ok(Persisted {
        value,
        path,
        is_new,
        discharged: false,
    })
}

/// Write `data` to `path` as a block-style YAML document with an explicit
/// start marker, creating the parent directory if needed.
pub fn save_configuration<T: Serialize + ?Sized>(data: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_directory(parent)?;
    }

    let document = to_document(data).map_err(|source| OctError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, document)?;

    debug!("Saved configuration to {:?}", path);
    Ok(())
}

/// Render `data` as a single block-style YAML document beginning with `---`.
///
/// Empty sequences and mappings below the top level are written as null.
pub fn to_document<T: Serialize + ?Sized>(data: &T) -> std::result::Result<String, serde_yaml::Error> {
    let mut value = serde_yaml::to_value(data)?;
    clear_empty_collections(&mut value);

    let body = serde_yaml::to_string(&value)?;
    if body.starts_with(DOCUMENT_START) {
        Ok(body)
    } else {
        Ok(format!("{DOCUMENT_START}\n{body}"))
    }
}

fn clear_empty_collections(value: &mut Value) {
    match value {
        Value::Sequence(items) => items.iter_mut().for_each(clear_nested),
        Value::Mapping(mapping) => mapping.values_mut().for_each(clear_nested),
        Value::Tagged(tagged) => clear_nested(&mut tagged.value),
        _ => {}
    }
}

fn clear_nested(value: &mut Value) {
    let empty = match value {
        Value::Sequence(items) => items.is_empty(),
        Value::Mapping(mapping) => mapping.is_empty(),
        _ => false,
    };
    if empty {
        *value = Value::Null;
    } else {
        clear_empty_collections(value);
    }
}

/// Create `path` and any missing parents. Succeeds if it already exists.
pub fn ensure_directory(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}

/// Discharge every obligation, continuing past failures.
///
/// Returns the first error encountered; later ones are logged.
pub fn discharge_all<'a, I>(obligations: I) -> Result<()>
where
    I: IntoIterator<Item = &'a mut dyn SaveObligation>,
{
    let mut first_error = None;
    for obligation in obligations {
        if let Err(e) = obligation.discharge() {
            error!("Failed to save {:?}: {}", obligation.path(), e);
            first_error.get_or_insert(e);
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
