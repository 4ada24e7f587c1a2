//! Persisted settings for the Ansible core client.
//!
//! `AnsibleCoreClient` is the engine-client configuration object: it holds
//! the defaults every `ansible-playbook` invocation starts from, and turns a
//! playbook, a composed variable bag and per-call [`OptionOverrides`] into a
//! [`PlaybookInvocation`] for a [`PlaybookRunner`].

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::error::{OctError, Result};
use crate::playbook_runner::{PlaybookInvocation, PlaybookOutput, PlaybookRunner};
use crate::variables::VariableBag;

/// Highest verbosity ansible-playbook understands (`-vvvvv`).
pub const MAX_VERBOSITY: u8 = 5;

const DEFAULT_PLAYBOOK_BINARY: &str = "ansible-playbook";
const LOG_FILE_NAME: &str = "ansible.log";

/// Settings for the Ansible core client, persisted between invocations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnsibleCoreClient {
    /// Directory holding the Ansible inventory
    pub inventory_dir: PathBuf,
    /// Directory Ansible writes its logs to
    pub log_directory: PathBuf,
    /// Verbosity level, 0 to 5
    #[serde(default)]
    pub verbosity: u8,
    /// Run playbooks in check mode
    #[serde(default)]
    pub check: bool,
    /// Host pattern to limit runs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
    /// Remote user to connect as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_user: Option<String>,
    /// Escalate privileges on the remote host
    #[serde(default)]
    pub become_root: bool,
    /// Name or path of the ansible-playbook executable
    #[serde(default = "default_playbook_binary")]
    pub playbook_binary: String,
    /// Additional arguments appended verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_arguments: Vec<String>,
}

fn default_playbook_binary() -> String {
    DEFAULT_PLAYBOOK_BINARY.to_string()
}

/// Per-invocation overrides of [`AnsibleCoreClient`] settings.
///
/// `None` (or an empty list) leaves the persisted setting in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionOverrides {
    pub verbosity: Option<u8>,
    pub check: Option<bool>,
    pub limit: Option<String>,
    pub remote_user: Option<String>,
    pub become_root: Option<bool>,
    pub tags: Vec<String>,
    pub skip_tags: Vec<String>,
}

impl OptionOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Settings that can be changed with `oct configure ansible-client`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ClientOption {
    InventoryDir,
    LogDirectory,
    Verbosity,
    Check,
    Limit,
    RemoteUser,
    BecomeRoot,
    PlaybookBinary,
}

impl AnsibleCoreClient {
    pub fn new(inventory_dir: impl Into<PathBuf>, log_directory: impl Into<PathBuf>) -> Self {
        Self {
            inventory_dir: inventory_dir.into(),
            log_directory: log_directory.into(),
            verbosity: 0,
            check: false,
            limit: None,
            remote_user: None,
            become_root: false,
            playbook_binary: default_playbook_binary(),
            extra_arguments: Vec::new(),
        }
    }

    /// Change one setting from its textual form.
    ///
    /// Optional settings are cleared with `none` or an empty value.
    pub fn set_option(&mut self, option: ClientOption, value: &str) -> Result<()> {
        match option {
            ClientOption::InventoryDir => self.inventory_dir = non_empty_path(option, value)?,
            ClientOption::LogDirectory => self.log_directory = non_empty_path(option, value)?,
            ClientOption::Verbosity => self.verbosity = parse_verbosity(value)?,
            ClientOption::Check => self.check = parse_bool(option, value)?,
            ClientOption::Limit => self.limit = optional(value),
            ClientOption::RemoteUser => self.remote_user = optional(value),
            ClientOption::BecomeRoot => self.become_root = parse_bool(option, value)?,
            ClientOption::PlaybookBinary => {
                let value = value.trim();
                if value.is_empty() {
                    return Err(OctError::validation("playbook-binary cannot be empty"));
                }
                self.playbook_binary = value.to_string();
            }
        }
        Ok(())
    }

    /// Build the invocation for `playbook_file`, applying `overrides` over
    /// the persisted settings.
    pub fn invocation(
        &self,
        playbook_file: PathBuf,
        variables: VariableBag,
        overrides: Option<&OptionOverrides>,
    ) -> PlaybookInvocation {
        let defaults = OptionOverrides::default();
        let overrides = overrides.unwrap_or(&defaults);

        PlaybookInvocation {
            binary: self.playbook_binary.clone(),
            playbook: playbook_file,
            inventory: self.inventory_dir.clone(),
            variables,
            verbosity: overrides.verbosity.unwrap_or(self.verbosity).min(MAX_VERBOSITY),
            check: overrides.check.unwrap_or(self.check),
            limit: overrides.limit.clone().or_else(|| self.limit.clone()),
            remote_user: overrides
                .remote_user
                .clone()
                .or_else(|| self.remote_user.clone()),
            become_root: overrides.become_root.unwrap_or(self.become_root),
            tags: overrides.tags.clone(),
            skip_tags: overrides.skip_tags.clone(),
            extra_arguments: self.extra_arguments.clone(),
            log_file: Some(self.log_directory.join(LOG_FILE_NAME)),
        }
    }

    /// Run `playbook_file` through `runner`.
    ///
    /// Errors from the runner are returned as-is.
    pub fn run_playbook(
        &self,
        runner: &dyn PlaybookRunner,
        playbook_file: PathBuf,
        playbook_variables: VariableBag,
        option_overrides: Option<&OptionOverrides>,
    ) -> Result<PlaybookOutput> {
        let invocation = self.invocation(playbook_file, playbook_variables, option_overrides);
        runner.run(&invocation)
    }
}

fn non_empty_path(option: ClientOption, value: &str) -> Result<PathBuf> {
    let value = value.trim();
    if value.is_empty() {
        return Err(OctError::validation(format!("{option} cannot be empty")));
    }
    Ok(PathBuf::from(value))
}

fn parse_verbosity(value: &str) -> Result<u8> {
    match value.trim().parse::<u8>() {
        Ok(level) if level <= MAX_VERBOSITY => Ok(level),
        _ => Err(OctError::validation(format!(
            "verbosity must be between 0 and {MAX_VERBOSITY}, got '{value}'"
        ))),
    }
}

pub(crate) fn parse_bool(option: impl std::fmt::Display, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(OctError::validation(format!(
            "{option} expects a boolean, got '{value}'"
        ))),
    }
}

pub(crate) fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") {
        None
    } else {
        Some(value.to_string())
    }
}
