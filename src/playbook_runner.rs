//! Execution of Ansible playbooks.
//!
//! [`PlaybookRunner`] is the seam between oct and the playbook engine. The
//! configuration facade only ever talks to the trait, which keeps the
//! engine replaceable in tests. [`AnsiblePlaybookRunner`] is the real
//! implementation and spawns `ansible-playbook`.
//!
//! # Process handling
//!
//! - The engine runs in a new process group via `.in_new_process_group()`
//! - Its PID is registered with `ChildRegistry::global()` for the duration
//!   of the run, so a signal to oct stops the whole playbook tree
//! - stdio is inherited; Ansible output goes straight to the terminal
//! - When stdin is the terminal, the engine's group is made the foreground
//!   group for the run so prompts (`pause`, `vars_prompt`,
//!   `--ask-become-pass`) can read it

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use crate::error::{OctError, Result};
use crate::persistence::ensure_directory;
use crate::process_guard::{ChildRegistry, CommandProcessGroup, TerminalForeground};
use crate::variables::VariableBag;

/// Everything needed to start one `ansible-playbook` run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybookInvocation {
    pub binary: String,
    pub playbook: PathBuf,
    pub inventory: PathBuf,
    pub variables: VariableBag,
    pub verbosity: u8,
    pub check: bool,
    pub limit: Option<String>,
    pub remote_user: Option<String>,
    pub become_root: bool,
    pub tags: Vec<String>,
    pub skip_tags: Vec<String>,
    pub extra_arguments: Vec<String>,
    /// Exported to the engine as `ANSIBLE_LOG_PATH`
    pub log_file: Option<PathBuf>,
}

impl PlaybookInvocation {
    /// Command-line arguments for `ansible-playbook`, playbook last.
    ///
    /// Extra variables are passed as one JSON document so types survive.
    pub fn to_cli_args(&self) -> Result<Vec<String>> {
        let mut args = vec![
            "--inventory".to_string(),
            self.inventory.display().to_string(),
        ];

        if self.verbosity > 0 {
            args.push(format!("-{}", "v".repeat(self.verbosity as usize)));
        }
        if self.check {
            args.push("--check".to_string());
        }
        if let Some(limit) = &self.limit {
            args.push("--limit".to_string());
            args.push(limit.clone());
        }
        if let Some(user) = &self.remote_user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        if self.become_root {
            args.push("--become".to_string());
        }
        if !self.tags.is_empty() {
            args.push("--tags".to_string());
            args.push(self.tags.join(","));
        }
        if !self.skip_tags.is_empty() {
            args.push("--skip-tags".to_string());
            args.push(self.skip_tags.join(","));
        }
        if !self.variables.is_empty() {
            args.push("--extra-vars".to_string());
            args.push(serde_json::to_string(&self.variables)?);
        }
        args.extend(self.extra_arguments.iter().cloned());
        args.push(self.playbook.display().to_string());

        Ok(args)
    }
}

/// Outcome of a playbook run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybookOutput {
    pub playbook: PathBuf,
    /// Exit code (None if terminated by signal)
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl PlaybookOutput {
    /// Turn an unsuccessful run into an error.
    pub fn ensure_success(&self) -> Result<()> {
        if self.success {
            Ok(())
        } else {
            Err(OctError::PlaybookFailed {
                playbook: self.playbook.clone(),
                code: self.exit_code.unwrap_or(-1),
            })
        }
    }
}

/// The external playbook engine.
pub trait PlaybookRunner {
    /// Run the playbook and block until it finishes.
    fn run(&self, invocation: &PlaybookInvocation) -> Result<PlaybookOutput>;
}

/// Runs playbooks with the `ansible-playbook` executable.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnsiblePlaybookRunner;

impl PlaybookRunner for AnsiblePlaybookRunner {
    fn run(&self, invocation: &PlaybookInvocation) -> Result<PlaybookOutput> {
        let args = invocation.to_cli_args()?;
        info!(
            "Running {} {:?}",
            invocation.binary,
            invocation.playbook
        );
        debug!("ansible-playbook args={:?}", args);

        let mut cmd = Command::new(&invocation.binary);
        cmd.args(&args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .in_new_process_group();

        if let Some(log_file) = &invocation.log_file {
            if let Some(parent) = log_file.parent() {
                ensure_directory(parent)?;
            }
            cmd.env("ANSIBLE_LOG_PATH", log_file);
        }

        let mut child = cmd.spawn().map_err(|source| OctError::Spawn {
            binary: invocation.binary.clone(),
            source,
        })?;
        let pid = child.id();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid);
        }

        // The child leads its own group, so its pid is the group id
        let foreground = TerminalForeground::acquire(std::io::stdin(), pid);
        let status = child.wait();
        drop(foreground);

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let status = status?;
        let exit_code = status.code();
        if status.success() {
            info!("Playbook {:?} completed successfully", invocation.playbook);
        } else {
            warn!(
                "Playbook {:?} failed with exit code {}",
                invocation.playbook,
                exit_code.unwrap_or(-1)
            );
        }

        Ok(PlaybookOutput {
            playbook: invocation.playbook.clone(),
            exit_code,
            success: status.success(),
        })
    }
}
