//! oct library
//!
//! Persistent configuration, the Vagrant VM registry and playbook execution
//! for the origin-ci-tool command line.

pub mod ansible_client;
pub mod aws;
pub mod cli;
pub mod commands;
pub mod configuration;
pub mod error;
pub mod hostname;
pub mod persistence;
pub mod playbook;
pub mod playbook_runner;
pub mod process_guard;
pub mod vagrant;
pub mod variables;

// Re-export main types for convenience
pub use ansible_client::{AnsibleCoreClient, ClientOption, OptionOverrides};
pub use aws::{AwsClientConfiguration, AwsOption, AwsVariables};
pub use configuration::{ConfigPaths, Configuration};
pub use error::{OctError, Result};
pub use hostname::{DEFAULT_HOSTNAME, next_available};
pub use persistence::{Persisted, SaveObligation, load_configuration, save_configuration};
pub use playbook::PlaybookResolver;
pub use playbook_runner::{
    AnsiblePlaybookRunner, PlaybookInvocation, PlaybookOutput, PlaybookRunner,
};
pub use vagrant::{VagrantVmMetadata, VmRegistry, scan};
pub use variables::{PlaybookExtraVariables, VariableBag, VariableDefaults, compose};
