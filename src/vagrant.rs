//! Registry of local Vagrant VMs, rebuilt from the directory layout.
//!
//! Every machine provisioned by oct lives in its own directory under the
//! Vagrant root. A directory counts as a machine iff it contains
//! `variables.yml`; `groups.yml` is optional. There is no index file, so the
//! registry can never disagree with what is on disk.

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::debug;

use crate::error::{OctError, Result};
use crate::persistence::ensure_directory;
use crate::variables::VariableBag;

pub const VARIABLES_FILE: &str = "variables.yml";
pub const GROUPS_FILE: &str = "groups.yml";

/// Metadata for one provisioned Vagrant VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VagrantVmMetadata {
    pub variable_file: PathBuf,
    /// May not exist
    pub group_file: PathBuf,
}

impl VagrantVmMetadata {
    /// Metadata for the machine stored in `directory`.
    pub fn for_directory(directory: &Path) -> Self {
        Self {
            variable_file: directory.join(VARIABLES_FILE),
            group_file: directory.join(GROUPS_FILE),
        }
    }

    /// The machine's directory.
    pub fn directory(&self) -> &Path {
        self.variable_file.parent().unwrap_or(Path::new(""))
    }

    /// Hostname, taken from the directory name.
    pub fn hostname(&self) -> String {
        self.directory()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Read the machine's variables.
    pub fn variables(&self) -> Result<VariableBag> {
        let value: Value = read_yaml(&self.variable_file)?;
        if value.is_null() {
            return Ok(VariableBag::new());
        }
        serde_yaml::from_value(value).map_err(|source| OctError::Deserialize {
            path: self.variable_file.clone(),
            source,
        })
    }

    /// Read the inventory groups the machine belongs to.
    ///
    /// A missing groups file means no groups.
    pub fn groups(&self) -> Result<Vec<String>> {
        if !self.group_file.exists() {
            return Ok(Vec::new());
        }
        let value: Value = read_yaml(&self.group_file)?;
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Sequence(_) => serde_yaml::from_value(value).map_err(|source| {
                OctError::Deserialize {
                    path: self.group_file.clone(),
                    source,
                }
            }),
            Value::Mapping(mapping) => Ok(mapping
                .keys()
                .filter_map(|k| k.as_str().map(str::to_string))
                .collect()),
            _ => Err(OctError::config(format!(
                "{:?} must hold a list of groups",
                self.group_file
            ))),
        }
    }
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    serde_yaml::from_str(&content).map_err(|source| OctError::Deserialize {
        path: path.to_path_buf(),
        source,
    })
}

/// Snapshot of the Vagrant VMs found under a root directory.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VmRegistry {
    root: PathBuf,
    machines: Vec<VagrantVmMetadata>,
}

impl VmRegistry {
    pub fn new(root: impl Into<PathBuf>, machines: Vec<VagrantVmMetadata>) -> Self {
        Self {
            root: root.into(),
            machines,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Machines sorted by hostname.
    pub fn machines(&self) -> &[VagrantVmMetadata] {
        &self.machines
    }

    pub fn len(&self) -> usize {
        self.machines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    pub fn find(&self, hostname: &str) -> Option<&VagrantVmMetadata> {
        self.machines.iter().find(|m| m.hostname() == hostname)
    }
}

/// Scan `vm_root` for provisioned machines.
///
/// A missing root is created and yields an empty registry. Subdirectories
/// without `variables.yml` are skipped. The result is sorted by directory
/// name.
pub fn scan(vm_root: &Path) -> Result<VmRegistry> {
    if !vm_root.exists() {
        debug!("Creating Vagrant root {:?}", vm_root);
        ensure_directory(vm_root)?;
        return Ok(VmRegistry::new(vm_root, Vec::new()));
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(vm_root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join(VARIABLES_FILE).exists() {
            entries.push(path);
        } else {
            debug!("Skipping {:?}: no {}", path, VARIABLES_FILE);
        }
    }
    entries.sort();

    let machines = entries
        .iter()
        .map(|dir| VagrantVmMetadata::for_directory(dir))
        .collect();
    Ok(VmRegistry::new(vm_root, machines))
}
