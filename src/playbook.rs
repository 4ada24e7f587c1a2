//! Resolution of playbook identifiers such as `prepare/main` to files.

use std::env;
use std::path::{Component, Path, PathBuf};

use crate::error::{OctError, Result};

/// Environment variable overriding the playbook directory.
pub const PLAYBOOK_HOME_ENV: &str = "OCT_PLAYBOOK_HOME";

const PLAYBOOK_DIRECTORY: &str = "playbooks";
const PLAYBOOK_EXTENSION: &str = "yml";

/// Maps relative playbook identifiers onto the playbook directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybookResolver {
    root: PathBuf,
}

impl PlaybookResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `$OCT_PLAYBOOK_HOME`, else a `playbooks` directory next to the
    /// running executable.
    pub fn from_env() -> Result<Self> {
        if let Some(root) = env::var_os(PLAYBOOK_HOME_ENV).filter(|v| !v.is_empty()) {
            return Ok(Self::new(root));
        }

        let exe = env::current_exe()?;
        let dir = exe
            .parent()
            .ok_or_else(|| OctError::config(format!("executable {exe:?} has no parent")))?;
        Ok(Self::new(dir.join(PLAYBOOK_DIRECTORY)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `identifier` (relative, no extension) to a playbook file.
    ///
    /// The file is not required to exist.
    pub fn resolve(&self, identifier: &str) -> Result<PathBuf> {
        let relative = Path::new(identifier);
        let is_plain = !identifier.trim().is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        let file_name = relative
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|_| is_plain)
            .ok_or_else(|| {
                OctError::validation(format!("invalid playbook identifier '{identifier}'"))
            })?;

        // Appended, never substituted: `upgrade/3.9` is `upgrade/3.9.yml`
        Ok(self
            .root
            .join(relative)
            .with_file_name(format!("{file_name}.{PLAYBOOK_EXTENSION}")))
    }
}
