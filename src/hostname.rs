//! Allocation of hostnames for new Vagrant VMs.

use std::fs;
use std::path::Path;

use crate::error::{OctError, Result};

/// Hostname given to the first local VM.
pub const DEFAULT_HOSTNAME: &str = "openshiftdevel";

/// Whether a VM directory called `name` already exists under `vm_root`.
///
/// Any directory blocks the name, whether or not it holds a machine.
pub fn hostname_taken(vm_root: &Path, name: &str) -> bool {
    vm_root.join(name).is_dir()
}

/// The first free hostname among `default_name`, `default_name0`,
/// `default_name1`, ... `default_nameN`, where N is the number of entries
/// under `vm_root`.
///
/// N entries can block at most N of those N + 2 candidates, so a name is
/// always found. Nothing is reserved; create the directory before
/// allocating again.
pub fn next_available(vm_root: &Path, default_name: &str) -> Result<String> {
    if !hostname_taken(vm_root, default_name) {
        return Ok(default_name.to_string());
    }

    let entries = match fs::read_dir(vm_root) {
        Ok(entries) => entries.count(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };

    (0..=entries)
        .map(|i| format!("{default_name}{i}"))
        .find(|candidate| !hostname_taken(vm_root, candidate))
        .ok_or_else(|| OctError::HostnameExhausted {
            base: default_name.to_string(),
            root: vm_root.to_path_buf(),
        })
}
