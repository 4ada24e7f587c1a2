//! The configuration facade.
//!
//! [`Configuration`] holds all of the state oct persists between
//! invocations. It derives every path from one root directory, owns the
//! loaded configuration objects together with their save obligations, holds
//! a snapshot of the Vagrant VM registry, and is the single entry point for
//! running playbooks.
//!
//! # Lifecycle
//!
//! ```ignore
//! let config = Configuration::load()?;
//! let result = handle(&mut config);
//! config.persist()?;   // every object written exactly once
//! result
//! ```
//!
//! If the caller bails out before `persist`, each object is still written
//! when the facade is dropped.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::ansible_client::{AnsibleCoreClient, OptionOverrides};
use crate::aws::{AwsClientConfiguration, AwsVariables};
use crate::error::{OctError, Result};
use crate::hostname::{self, DEFAULT_HOSTNAME};
use crate::persistence::{Persisted, SaveObligation, discharge_all, load_configuration};
use crate::playbook::PlaybookResolver;
use crate::playbook_runner::{AnsiblePlaybookRunner, PlaybookOutput, PlaybookRunner};
use crate::vagrant::{self, VagrantVmMetadata, VmRegistry};
use crate::variables::{
    PlaybookExtraVariables, VariableBag, VariableDefaults, VariableSet, compose,
};

/// Environment variable overriding the base configuration directory.
pub const CONFIG_HOME_ENV: &str = "OCT_CONFIG_HOME";

const CONFIGURATION_DIRECTORY: &str = "origin-ci-tool";
const ANSIBLE_CLIENT_CONFIGURATION_FILE: &str = "ansible_client_configuration.yml";
const ANSIBLE_VARIABLES_FILE: &str = "ansible_variables.yml";
const ANSIBLE_INVENTORY_DIRECTORY: &str = "inventory";
const LOG_DIRECTORY: &str = "logs";
const AWS_CLIENT_CONFIGURATION_FILE: &str = "aws_client_configuration.yml";
const AWS_VARIABLES_FILE: &str = "aws_variables.yml";
const VAGRANT_ROOT_DIRECTORY: &str = "vagrant";
const VAGRANT_BOX_DIRECTORY: &str = "boxes";

/// Paths of everything oct keeps on disk. All are joins under one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    root: PathBuf,
}

impl ConfigPaths {
    /// Use `root` as the configuration directory itself.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve the root from `$OCT_CONFIG_HOME` or the platform config dir.
    pub fn from_env() -> Result<Self> {
        Self::resolve(env::var_os(CONFIG_HOME_ENV), dirs::config_dir())
    }

    /// `<base>/origin-ci-tool`, where base is `env_override` when set and
    /// non-empty, otherwise `config_home`.
    pub fn resolve(env_override: Option<OsString>, config_home: Option<PathBuf>) -> Result<Self> {
        let base = env_override
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .or(config_home)
            .ok_or_else(|| {
                OctError::config(format!(
                    "cannot determine a configuration directory; set {CONFIG_HOME_ENV}"
                ))
            })?;
        let root = std::path::absolute(base.join(CONFIGURATION_DIRECTORY))?;
        Ok(Self::new(root))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ansible_inventory_path(&self) -> PathBuf {
        self.root.join(ANSIBLE_INVENTORY_DIRECTORY)
    }

    pub fn ansible_log_path(&self) -> PathBuf {
        self.root.join(LOG_DIRECTORY)
    }

    pub fn ansible_client_configuration_path(&self) -> PathBuf {
        self.root.join(ANSIBLE_CLIENT_CONFIGURATION_FILE)
    }

    pub fn variables_path(&self) -> PathBuf {
        self.root.join(ANSIBLE_VARIABLES_FILE)
    }

    pub fn aws_client_configuration_path(&self) -> PathBuf {
        self.root.join(AWS_CLIENT_CONFIGURATION_FILE)
    }

    pub fn aws_variables_path(&self) -> PathBuf {
        self.root.join(AWS_VARIABLES_FILE)
    }

    /// Directory holding one subdirectory per Vagrant VM.
    pub fn vagrant_directory_root(&self) -> PathBuf {
        self.root.join(VAGRANT_ROOT_DIRECTORY)
    }

    pub fn vagrant_box_directory(&self) -> PathBuf {
        self.vagrant_directory_root().join(VAGRANT_BOX_DIRECTORY)
    }

    /// Storage directory for the VM called `name`.
    pub fn vagrant_home_directory(&self, name: &str) -> PathBuf {
        self.vagrant_directory_root().join(name)
    }
}

/// All persisted state, plus the entry point for running playbooks.
pub struct Configuration {
    paths: ConfigPaths,
    /// Settings for the Ansible core client
    pub ansible_client_configuration: Persisted<AnsibleCoreClient>,
    /// Extra variables sent to every playbook
    pub ansible_variables: Persisted<PlaybookExtraVariables>,
    vagrant_machines: VmRegistry,
    /// Settings for the AWS client
    pub aws_client_configuration: Persisted<AwsClientConfiguration>,
    /// Extra variables for playbooks that touch the AWS API
    pub aws_variables: Persisted<AwsVariables>,
    resolver: PlaybookResolver,
    runner: Box<dyn PlaybookRunner>,
}

impl Configuration {
    /// Load using the root from the environment.
    pub fn load() -> Result<Self> {
        Self::load_from(ConfigPaths::from_env()?)
    }

    /// Load every configuration object under `paths` and scan the Vagrant
    /// root.
    pub fn load_from(paths: ConfigPaths) -> Result<Self> {
        debug!("Loading configuration from {:?}", paths.root());

        let inventory_dir = paths.ansible_inventory_path();
        let log_directory = paths.ansible_log_path();
        let ansible_client_configuration =
            load_configuration(paths.ansible_client_configuration_path(), || {
                AnsibleCoreClient::new(inventory_dir, log_directory)
            })?;

        let ansible_variables =
            load_configuration(paths.variables_path(), PlaybookExtraVariables::default)?;

        let vagrant_machines = vagrant::scan(&paths.vagrant_directory_root())?;

        let aws_client_configuration = load_configuration(
            paths.aws_client_configuration_path(),
            AwsClientConfiguration::default,
        )?;

        let aws_variables = load_configuration(paths.aws_variables_path(), AwsVariables::default)?;

        Ok(Self {
            paths,
            ansible_client_configuration,
            ansible_variables,
            vagrant_machines,
            aws_client_configuration,
            aws_variables,
            resolver: PlaybookResolver::from_env()?,
            runner: Box::new(AnsiblePlaybookRunner),
        })
    }

    /// Replace the playbook engine.
    pub fn with_runner(mut self, runner: Box<dyn PlaybookRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Replace the playbook resolver.
    pub fn with_resolver(mut self, resolver: PlaybookResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    pub fn resolver(&self) -> &PlaybookResolver {
        &self.resolver
    }

    /// Variables a playbook run would receive for `playbook_variables`.
    ///
    /// Core defaults, then AWS defaults, then the caller's variables.
    pub fn playbook_variables(&self, playbook_variables: Option<&VariableBag>) -> VariableBag {
        let bases: [&dyn VariableDefaults; 2] =
            [self.ansible_variables.inner(), self.aws_variables.inner()];
        compose(&bases, playbook_variables)
    }

    /// Variables an AWS playbook run would receive.
    ///
    /// Like [`playbook_variables`](Self::playbook_variables), with the AWS
    /// client settings layered between the core and the AWS defaults.
    pub fn aws_playbook_variables(&self, playbook_variables: Option<&VariableBag>) -> VariableBag {
        let client = VariableSet::new(self.aws_client_configuration.playbook_variables());
        let bases: [&dyn VariableDefaults; 3] =
            [self.ansible_variables.inner(), &client, self.aws_variables.inner()];
        compose(&bases, playbook_variables)
    }

    /// Run the playbook identified by `playbook_relative_path` (relative to
    /// the playbook directory, no extension, e.g. `prepare/main`).
    ///
    /// Blocks until the engine finishes. Engine errors are returned as-is.
    pub fn run_playbook(
        &self,
        playbook_relative_path: &str,
        playbook_variables: Option<&VariableBag>,
        option_overrides: Option<&OptionOverrides>,
    ) -> Result<PlaybookOutput> {
        let variables = self.playbook_variables(playbook_variables);
        self.run_with_variables(playbook_relative_path, variables, option_overrides)
    }

    /// Run a playbook that talks to AWS, with variables from
    /// [`aws_playbook_variables`](Self::aws_playbook_variables).
    pub fn run_aws_playbook(
        &self,
        playbook_relative_path: &str,
        playbook_variables: Option<&VariableBag>,
        option_overrides: Option<&OptionOverrides>,
    ) -> Result<PlaybookOutput> {
        let variables = self.aws_playbook_variables(playbook_variables);
        self.run_with_variables(playbook_relative_path, variables, option_overrides)
    }

    fn run_with_variables(
        &self,
        playbook_relative_path: &str,
        variables: VariableBag,
        option_overrides: Option<&OptionOverrides>,
    ) -> Result<PlaybookOutput> {
        let playbook_file = self.resolver.resolve(playbook_relative_path)?;

        self.ansible_client_configuration.run_playbook(
            self.runner.as_ref(),
            playbook_file,
            variables,
            option_overrides,
        )
    }

    /// Vagrant VMs found when the configuration was loaded.
    pub fn registered_vagrant_machines(&self) -> &[VagrantVmMetadata] {
        self.vagrant_machines.machines()
    }

    pub fn vagrant_registry(&self) -> &VmRegistry {
        &self.vagrant_machines
    }

    /// Next free hostname for a local VM.
    pub fn next_available_vagrant_name(&self) -> Result<String> {
        hostname::next_available(&self.paths.vagrant_directory_root(), DEFAULT_HOSTNAME)
    }

    pub fn vagrant_home_directory(&self, name: &str) -> PathBuf {
        self.paths.vagrant_home_directory(name)
    }

    /// The save obligation of every loaded object.
    pub fn save_obligations(&mut self) -> Vec<&mut dyn SaveObligation> {
        vec![
            &mut self.ansible_client_configuration as &mut dyn SaveObligation,
            &mut self.ansible_variables as &mut dyn SaveObligation,
            &mut self.aws_client_configuration as &mut dyn SaveObligation,
            &mut self.aws_variables as &mut dyn SaveObligation,
        ]
    }

    /// Write every object to disk.
    ///
    /// All objects are attempted; the first failure is returned.
    pub fn persist(mut self) -> Result<()> {
        discharge_all(self.save_obligations())
    }
}
